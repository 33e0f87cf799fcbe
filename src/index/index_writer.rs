use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::Utc;
use parking_lot::RwLock;
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::compression::compress::CompressionType;
use crate::core::error::Result;
use crate::core::types::{DocId, Document};
use crate::index::inverted::InvertedIndex;
use crate::storage::directory::Directory;
use crate::storage::segment::{
    decode_generation, decode_segment, encode_generation, encode_segment, segments_file_name, SegmentId,
    SegmentOp, SegmentsFile, SEGMENTS_GEN,
};

/// Single writer over a segment directory. Changes are searchable at once
/// and durable after `commit`.
pub struct IndexWriter {
    directory: Arc<dyn Directory>,
    analyzers: Arc<AnalyzerRegistry>,
    index: Arc<RwLock<InvertedIndex>>,
    pending: Vec<SegmentOp>,
    segments: Vec<String>,
    generation: u64,
    user_data: BTreeMap<String, String>,
    compression: CompressionType,
}

impl IndexWriter {
    /// Open the directory, replaying the segments of the marked generation.
    pub fn open(
        directory: Arc<dyn Directory>,
        analyzers: Arc<AnalyzerRegistry>,
        compression: CompressionType,
    ) -> Result<Self> {
        let mut writer = IndexWriter {
            directory,
            analyzers,
            index: Arc::new(RwLock::new(InvertedIndex::new())),
            pending: Vec::new(),
            segments: Vec::new(),
            generation: 0,
            user_data: BTreeMap::new(),
            compression,
        };
        writer.load()?;
        Ok(writer)
    }

    fn load(&mut self) -> Result<()> {
        if !self.directory.file_exists(SEGMENTS_GEN) {
            return Ok(());
        }
        let generation = decode_generation(&self.directory.read_file(SEGMENTS_GEN)?)?;
        let commit = SegmentsFile::from_bytes(&self.directory.read_file(&segments_file_name(generation))?)?;

        let mut index = InvertedIndex::new();
        let mut replayed = 0usize;
        for name in &commit.segments {
            let ops = decode_segment(&self.directory.read_file(name)?)?;
            replayed += ops.len();
            for op in &ops {
                apply(&mut index, op, &self.analyzers)?;
            }
        }

        tracing::debug!(generation, segments = commit.segments.len(), ops = replayed, "index opened");
        *self.index.write() = index;
        self.generation = commit.generation;
        self.segments = commit.segments;
        self.user_data = commit.user_data;
        Ok(())
    }

    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        let doc_id = self.index.write().add_document(&doc, &self.analyzers)?;
        self.pending.push(SegmentOp::Add(doc));
        Ok(doc_id)
    }

    /// Delete every document holding the exact term. Returns how many.
    pub fn delete_term(&mut self, field: &str, term: &str) -> u64 {
        let deleted = self.index.write().delete_term(field, term);
        self.pending.push(SegmentOp::DeleteTerm { field: field.to_string(), term: term.to_string() });
        deleted
    }

    /// Replace the documents holding the term with `doc`. The replacement is
    /// analyzed first; if that fails nothing is deleted.
    pub fn update_document(&mut self, field: &str, term: &str, doc: Document) -> Result<DocId> {
        let doc_id = {
            let analyzed = InvertedIndex::analyze(&doc, &self.analyzers)?;
            let mut index = self.index.write();
            index.delete_term(field, term);
            index.insert(analyzed)
        };
        self.pending.push(SegmentOp::DeleteTerm { field: field.to_string(), term: term.to_string() });
        self.pending.push(SegmentOp::Add(doc));
        Ok(doc_id)
    }

    /// Persist pending operations as a new generation. Returns the generation.
    pub fn commit(&mut self, user_data: BTreeMap<String, String>) -> Result<u64> {
        let mut segments = self.segments.clone();
        if !self.pending.is_empty() {
            let segment = SegmentId::new().file_name();
            let bytes = encode_segment(&self.pending, self.compression)?;
            self.directory.write_file(&segment, &bytes)?;
            segments.push(segment);
        }

        let previous = self.generation;
        let commit = SegmentsFile {
            generation: previous + 1,
            segments,
            user_data,
            created_at: Utc::now(),
        };
        self.directory.write_file(&commit.file_name(), &commit.to_bytes()?)?;
        self.directory.sync()?;
        self.directory.write_file(SEGMENTS_GEN, &encode_generation(commit.generation))?;
        self.directory.sync()?;

        let stale = segments_file_name(previous);
        if previous > 0 && self.directory.file_exists(&stale) {
            self.directory.delete_file(&stale)?;
        }

        tracing::debug!(generation = commit.generation, ops = self.pending.len(), "segments committed");
        self.pending.clear();
        self.generation = commit.generation;
        self.segments = commit.segments;
        self.user_data = commit.user_data;
        Ok(self.generation)
    }

    /// Drop uncommitted changes by reloading the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        *self.index.write() = InvertedIndex::new();
        self.segments.clear();
        self.generation = 0;
        self.user_data.clear();
        self.load()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn user_data(&self) -> &BTreeMap<String, String> {
        &self.user_data
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn index(&self) -> Arc<RwLock<InvertedIndex>> {
        self.index.clone()
    }

    pub fn directory(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }
}

fn apply(index: &mut InvertedIndex, op: &SegmentOp, analyzers: &AnalyzerRegistry) -> Result<()> {
    match op {
        SegmentOp::Add(doc) => {
            index.add_document(doc, analyzers)?;
        }
        SegmentOp::DeleteTerm { field, term } => {
            index.delete_term(field, term);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Field;
    use crate::storage::directory::RamDirectory;

    fn person(id: &str, name: &str) -> Document {
        let mut doc = Document::new();
        doc.add_field(Field::term("$id", id));
        doc.add_field(Field::text("name", name, "standard"));
        doc
    }

    fn open(directory: Arc<dyn Directory>) -> IndexWriter {
        IndexWriter::open(directory, Arc::new(AnalyzerRegistry::new()), CompressionType::LZ4).unwrap()
    }

    #[test]
    fn commits_survive_reopen() {
        let directory: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let mut writer = open(directory.clone());
        writer.add_document(person("DOC_001", "Peter")).unwrap();
        writer.add_document(person("DOC_002", "Lars")).unwrap();
        assert_eq!(writer.commit(BTreeMap::new()).unwrap(), 1);

        writer.update_document("$id", "DOC_001", person("DOC_001", "Peter Parker")).unwrap();
        let user_data = BTreeMap::from([("k".to_string(), "v".to_string())]);
        assert_eq!(writer.commit(user_data).unwrap(), 2);
        drop(writer);

        let reopened = open(directory.clone());
        assert_eq!(reopened.generation(), 2);
        assert_eq!(reopened.user_data().get("k").map(String::as_str), Some("v"));
        let index = reopened.index();
        let index = index.read();
        assert_eq!(index.num_docs(), 2);
        assert!(index.postings("name", "parker").is_some());
        assert!(!directory.file_exists("segments_1"));
        assert!(directory.file_exists("segments_2"));
    }

    #[test]
    fn uncommitted_changes_are_lost_on_rollback() {
        let directory: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let mut writer = open(directory);
        writer.add_document(person("DOC_001", "Peter")).unwrap();
        writer.commit(BTreeMap::new()).unwrap();
        writer.delete_term("$id", "DOC_001");
        assert!(writer.has_uncommitted());
        assert_eq!(writer.index().read().num_docs(), 0);

        writer.rollback().unwrap();
        assert_eq!(writer.index().read().num_docs(), 1);
    }

    #[test]
    fn failed_update_keeps_the_original() {
        let directory: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let mut writer = open(directory);
        writer.add_document(person("DOC_001", "Peter")).unwrap();
        writer.commit(BTreeMap::new()).unwrap();

        let mut replacement = person("DOC_001", "Paul");
        replacement.add_field(Field::text("bio", "hello", "klingon"));
        assert!(writer.update_document("$id", "DOC_001", replacement).is_err());

        assert!(!writer.has_uncommitted());
        let index = writer.index();
        assert_eq!(index.read().num_docs(), 1);
        assert!(index.read().postings("name", "peter").is_some());
    }

    #[test]
    fn empty_commit_advances_generation_without_a_segment() {
        let directory: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let mut writer = open(directory.clone());
        writer.commit(BTreeMap::new()).unwrap();
        let segment_files = directory.list_files().unwrap().into_iter().filter(|f| f.ends_with(".seg")).count();
        assert_eq!(segment_files, 0);
        assert_eq!(writer.generation(), 1);
    }
}
