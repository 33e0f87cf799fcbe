use serde_json::json;
use tempfile::TempDir;
use jsondex::{Config, ErrorKind, JsonIndex};
use jsondex::schema::field_info::ResolvedKind;
use jsondex::storage::snapshot::{FolderSnapshotSource, FolderSnapshotTarget};

fn config(path: &std::path::Path) -> Config {
    Config { worker_threads: 2, ..Config::with_storage_path(path) }
}

fn fill(index: &JsonIndex, count: usize) {
    let docs = (0..count).map(|i| json!({"$id": format!("DOC_{:03}", i), "n": i})).collect();
    index.writer().create(docs).unwrap();
    index.writer().commit().unwrap();
}

#[test]
fn committed_documents_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let index = JsonIndex::open(config(dir.path())).unwrap();
        fill(&index, 30);
        index.writer().create(vec![json!({"$id": "UNCOMMITTED"})]).unwrap();
        index.close();
    }

    let index = JsonIndex::open(config(dir.path())).unwrap();
    assert_eq!(index.search("*").unwrap().total_hits, 30);
    assert_eq!(index.generation(), 1);
    assert!(matches!(index.field_infos().resolve("n", None), ResolvedKind::Numeric(_)));
}

#[test]
fn second_open_of_a_locked_directory_fails() {
    let dir = TempDir::new().unwrap();
    let _index = JsonIndex::open(config(dir.path())).unwrap();
    let err = JsonIndex::open(config(dir.path())).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidState);
}

#[test]
fn snapshot_then_restore_into_a_fresh_index() {
    let index_dir = TempDir::new().unwrap();
    let snapshot_dir = TempDir::new().unwrap();

    let index = JsonIndex::open(config(index_dir.path())).unwrap();
    fill(&index, 25);
    let generation = index.snapshot(&FolderSnapshotTarget::new(snapshot_dir.path())).unwrap();
    assert_eq!(generation, 1);
    index.close();

    let restored_dir = TempDir::new().unwrap();
    let fresh = JsonIndex::open(config(restored_dir.path())).unwrap();
    fill(&fresh, 3);
    let fresh = fresh.restore(&FolderSnapshotSource::new(snapshot_dir.path())).unwrap();

    let results = fresh.search("*").unwrap();
    assert_eq!(results.total_hits, 25);
    assert_eq!(fresh.count("n >= 20").unwrap(), 5);
    assert_eq!(fresh.generation(), 1);
}

#[test]
fn snapshot_without_a_commit_is_refused() {
    let snapshot_dir = TempDir::new().unwrap();
    let index = JsonIndex::open(Config { worker_threads: 1, ..Config::in_memory() }).unwrap();
    let err = index.snapshot(&FolderSnapshotTarget::new(snapshot_dir.path())).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
}
