use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};

pub const WRITE_LOCK: &str = "write.lock";

/// Exclusive writer lock on an index directory. Released on drop.
pub struct FileLock {
    pub file: File,
    pub path: PathBuf,
}

impl FileLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(WRITE_LOCK);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            unsafe {
                if flock(fd, LOCK_EX | LOCK_NB) != 0 {
                    return Err(Error::new(
                        ErrorKind::InvalidState,
                        format!("index directory {} is locked by another writer", dir.display()),
                    ));
                }
            }
        }

        Ok(FileLock { file, path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn second_writer_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::acquire(dir.path()).unwrap();
        let err = FileLock::acquire(dir.path()).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        drop(lock);
        assert!(FileLock::acquire(dir.path()).is_ok());
    }
}
