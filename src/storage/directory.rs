use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::RwLock;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::file_lock::{FileLock, WRITE_LOCK};

/// Flat namespace of index files.
pub trait Directory: Send + Sync {
    /// File names in lexical order.
    fn list_files(&self) -> Result<Vec<String>>;

    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// Replace the file contents atomically.
    fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;

    fn delete_file(&self, name: &str) -> Result<()>;

    fn file_exists(&self, name: &str) -> bool;

    fn sync(&self) -> Result<()>;
}

fn not_found(name: &str) -> Error {
    Error::new(ErrorKind::NotFound, format!("file {} not found", name))
}

/// Directory held in memory. Contents die with the value.
#[derive(Default)]
pub struct RamDirectory {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl RamDirectory {
    pub fn new() -> Self {
        RamDirectory::default()
    }
}

impl Directory for RamDirectory {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.files.read().get(name).cloned().ok_or_else(|| not_found(name))
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files.write().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.write().remove(name).map(|_| ()).ok_or_else(|| not_found(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Directory on the filesystem, held exclusively through `write.lock`.
pub struct FsDirectory {
    root: PathBuf,
    _lock: FileLock,
}

impl FsDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let lock = FileLock::acquire(&root)?;
        Ok(FsDirectory { root, _lock: lock })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl Directory for FsDirectory {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != WRITE_LOCK && !name.ends_with(".tmp") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        match fs::read(self.root.join(name)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let tmp = self.root.join(format!("{}.tmp", name));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.root.join(name))?;
        Ok(())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    fn file_exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn sync(&self) -> Result<()> {
        #[cfg(unix)]
        fs::File::open(&self.root)?.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(dir: &dyn Directory) {
        dir.write_file("b", b"two").unwrap();
        dir.write_file("a", b"one").unwrap();
        dir.write_file("a", b"uno").unwrap();
        assert_eq!(dir.list_files().unwrap(), vec!["a", "b"]);
        assert_eq!(dir.read_file("a").unwrap(), b"uno");
        dir.delete_file("b").unwrap();
        assert!(!dir.file_exists("b"));
        assert_eq!(dir.read_file("b").unwrap_err().kind, ErrorKind::NotFound);
        dir.sync().unwrap();
    }

    #[test]
    fn ram_directory_behaves_like_a_directory() {
        exercise(&RamDirectory::new());
    }

    #[test]
    fn fs_directory_hides_lock_and_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path().join("index")).unwrap();
        exercise(&dir);
        assert!(dir.path().join(WRITE_LOCK).exists());
    }
}
