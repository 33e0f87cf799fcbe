use std::fs;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::directory::Directory;
use crate::storage::segment::{
    decode_generation, encode_generation, parse_segments_file_name, segments_file_name, SegmentsFile, SEGMENTS_GEN,
};

const MANIFEST: &str = "snapshot.json";

/// Destination of a snapshot, one writer per generation.
pub trait SnapshotTarget {
    fn open(&self, generation: u64) -> Result<Box<dyn SnapshotWriter>>;
}

pub trait SnapshotWriter {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// The commit descriptor. Written after every other file.
    fn write_segments_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    fn finish(self: Box<Self>) -> Result<()>;
}

/// Origin of a restore.
pub trait SnapshotSource {
    fn open(&self) -> Result<Box<dyn SnapshotReader>>;
}

pub trait SnapshotReader {
    fn generation(&self) -> u64;

    /// Every file except the segments file.
    fn files(&self) -> Vec<String>;

    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    fn segments_file(&self) -> Result<Option<(String, Vec<u8>)>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub files: Vec<String>,
    pub segments_file: Option<String>,
}

/// Copy the last commit of `directory` into the target. Returns its generation.
pub fn snapshot(directory: &dyn Directory, target: &dyn SnapshotTarget) -> Result<u64> {
    if !directory.file_exists(SEGMENTS_GEN) {
        return Err(Error::invalid_state("nothing committed to snapshot"));
    }
    let generation = decode_generation(&directory.read_file(SEGMENTS_GEN)?)?;
    let segments_name = segments_file_name(generation);
    let segments_bytes = directory.read_file(&segments_name)?;
    let commit = SegmentsFile::from_bytes(&segments_bytes)?;

    tracing::info!(generation, files = commit.segments.len(), "snapshot started");
    let mut writer = target.open(generation)?;
    for name in &commit.segments {
        writer.write_file(name, &directory.read_file(name)?)?;
    }
    writer.write_segments_file(&segments_name, &segments_bytes)?;
    writer.finish()?;
    tracing::info!(generation, "snapshot finished");
    Ok(generation)
}

/// Replace the contents of `directory` with the snapshot. The segments file
/// goes in last and the generation marker is rewritten after it.
pub fn restore(directory: &dyn Directory, source: &dyn SnapshotSource) -> Result<u64> {
    let reader = source.open()?;
    let (segments_name, segments_bytes) = reader.segments_file()?.ok_or_else(|| {
        Error::new(ErrorKind::InvalidArgument, "snapshot holds no segments file")
    })?;
    let generation = parse_segments_file_name(&segments_name).unwrap_or_else(|| reader.generation());

    tracing::info!(generation, files = reader.files().len(), "restore started");
    for name in directory.list_files()? {
        directory.delete_file(&name)?;
    }
    for name in reader.files() {
        directory.write_file(&name, &reader.read_file(&name)?)?;
    }
    directory.sync()?;
    directory.write_file(&segments_name, &segments_bytes)?;
    directory.sync()?;
    directory.write_file(SEGMENTS_GEN, &encode_generation(generation))?;
    directory.sync()?;
    tracing::info!(generation, "restore finished");
    Ok(generation)
}

/// Snapshots stored as `<root>/<generation>/` folders.
pub struct FolderSnapshotTarget {
    root: PathBuf,
}

impl FolderSnapshotTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FolderSnapshotTarget { root: root.into() }
    }
}

impl SnapshotTarget for FolderSnapshotTarget {
    fn open(&self, generation: u64) -> Result<Box<dyn SnapshotWriter>> {
        let dir = self.root.join(generation.to_string());
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(Box::new(FolderSnapshotWriter {
            dir,
            manifest: SnapshotManifest {
                generation,
                created_at: Utc::now(),
                files: Vec::new(),
                segments_file: None,
            },
        }))
    }
}

struct FolderSnapshotWriter {
    dir: PathBuf,
    manifest: SnapshotManifest,
}

impl SnapshotWriter for FolderSnapshotWriter {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.dir.join(name), data)?;
        self.manifest.files.push(name.to_string());
        Ok(())
    }

    fn write_segments_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.dir.join(name), data)?;
        self.manifest.segments_file = Some(name.to_string());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        fs::write(self.dir.join(MANIFEST), serde_json::to_vec_pretty(&self.manifest)?)?;
        Ok(())
    }
}

/// Reads the newest generation under a snapshot root.
pub struct FolderSnapshotSource {
    root: PathBuf,
}

impl FolderSnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FolderSnapshotSource { root: root.into() }
    }

    fn newest_generation(&self) -> Result<Option<u64>> {
        if !self.root.is_dir() {
            return Ok(None);
        }
        let mut newest = None;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let generation = entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok());
            if let Some(generation) = generation {
                if entry.path().join(MANIFEST).is_file() {
                    newest = newest.max(Some(generation));
                }
            }
        }
        Ok(newest)
    }
}

impl SnapshotSource for FolderSnapshotSource {
    fn open(&self) -> Result<Box<dyn SnapshotReader>> {
        let generation = self.newest_generation()?.ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument, format!("no snapshot under {}", self.root.display()))
        })?;
        let dir = self.root.join(generation.to_string());
        let manifest: SnapshotManifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST))?)?;
        Ok(Box::new(FolderSnapshotReader { dir, manifest }))
    }
}

struct FolderSnapshotReader {
    dir: PathBuf,
    manifest: SnapshotManifest,
}

impl SnapshotReader for FolderSnapshotReader {
    fn generation(&self) -> u64 {
        self.manifest.generation
    }

    fn files(&self) -> Vec<String> {
        self.manifest.files.clone()
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.dir.join(name))?)
    }

    fn segments_file(&self) -> Result<Option<(String, Vec<u8>)>> {
        match &self.manifest.segments_file {
            Some(name) => Ok(Some((name.clone(), self.read_file(name)?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::storage::directory::RamDirectory;

    fn committed_directory() -> RamDirectory {
        let dir = RamDirectory::new();
        dir.write_file("a.seg", b"segment").unwrap();
        let commit = SegmentsFile {
            generation: 3,
            segments: vec!["a.seg".into()],
            user_data: BTreeMap::new(),
            created_at: Utc::now(),
        };
        dir.write_file("segments_3", &commit.to_bytes().unwrap()).unwrap();
        dir.write_file(SEGMENTS_GEN, &encode_generation(3)).unwrap();
        dir
    }

    #[test]
    fn snapshot_then_restore_into_fresh_directory() {
        let root = tempfile::tempdir().unwrap();
        let generation = snapshot(&committed_directory(), &FolderSnapshotTarget::new(root.path())).unwrap();
        assert_eq!(generation, 3);
        assert!(root.path().join("3").join(MANIFEST).is_file());

        let fresh = RamDirectory::new();
        fresh.write_file("stale.seg", b"old").unwrap();
        assert_eq!(restore(&fresh, &FolderSnapshotSource::new(root.path())).unwrap(), 3);
        assert_eq!(fresh.list_files().unwrap(), vec!["a.seg", "segments.gen", "segments_3"]);
        assert_eq!(decode_generation(&fresh.read_file(SEGMENTS_GEN).unwrap()).unwrap(), 3);
    }

    #[test]
    fn source_picks_newest_generation() {
        let root = tempfile::tempdir().unwrap();
        let target = FolderSnapshotTarget::new(root.path());
        for generation in [2, 10, 7] {
            target.open(generation).unwrap().finish().unwrap();
        }
        let reader = FolderSnapshotSource::new(root.path()).open().unwrap();
        assert_eq!(reader.generation(), 10);
    }

    #[test]
    fn restore_without_segments_file_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut writer = FolderSnapshotTarget::new(root.path()).open(1).unwrap();
        writer.write_file("a.seg", b"x").unwrap();
        writer.finish().unwrap();

        let err = restore(&RamDirectory::new(), &FolderSnapshotSource::new(root.path())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn snapshot_requires_a_commit() {
        let root = tempfile::tempdir().unwrap();
        let err = snapshot(&RamDirectory::new(), &FolderSnapshotTarget::new(root.path())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }
}
