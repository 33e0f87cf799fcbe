use std::collections::BTreeSet;
use std::sync::Arc;
use serde_json::{json, Value};
use jsondex::{Config, ErrorKind, JsonIndex};
use jsondex::analysis::analyzer::ENGLISH;
use jsondex::fields::strategies::TextStrategy;

fn open() -> JsonIndex {
    JsonIndex::open(Config { worker_threads: 2, ..Config::default() }).unwrap()
}

fn keys(index: &JsonIndex, query: &str) -> BTreeSet<String> {
    index.search(query).unwrap()
        .values_of("key")
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn persons() -> JsonIndex {
    let index = open();
    index.writer().create(vec![
        json!({"key": "DOC_001", "name": "Peter", "age": 20, "created": "2014-09-10T11:00:00Z"}),
        json!({"key": "DOC_002", "name": "Lars", "age": 30, "created": "2012-03-01T08:30:00Z"}),
    ]).unwrap();
    index.writer().commit().unwrap();
    index
}

#[test]
fn and_or_queries_over_persons() {
    let index = persons();
    assert_eq!(keys(&index, "age = 20 and name = Peter"), BTreeSet::from(["DOC_001".to_string()]));
    assert_eq!(
        keys(&index, "age = 30 or name = Peter"),
        BTreeSet::from(["DOC_001".to_string(), "DOC_002".to_string()])
    );
    assert!(keys(&index, "age = 30 and name = Peter").is_empty());
    index.close();
}

#[test]
fn match_all_and_counts() {
    let index = persons();
    assert_eq!(index.search("*").unwrap().total_hits, 2);
    assert_eq!(index.count("age >= 20").unwrap(), 2);
    assert_eq!(index.count("age > 20").unwrap(), 1);
    assert_eq!(index.num_docs(), 2);
    assert_eq!(index.generation(), 1);
}

#[test]
fn order_by_controls_hit_order() {
    let index = persons();
    let results = index.search("* ORDER BY age DESC").unwrap();
    let order: Vec<_> = results.values_of("key").cloned().collect();
    assert_eq!(order, vec![json!("DOC_002"), json!("DOC_001")]);

    let results = index.search("* ORDER BY name ASC").unwrap();
    let order: Vec<_> = results.values_of("name").cloned().collect();
    assert_eq!(order, vec![json!("Lars"), json!("Peter")]);
}

#[test]
fn in_lists_and_negation() {
    let index = persons();
    assert_eq!(keys(&index, "age IN (20, 40)"), BTreeSet::from(["DOC_001".to_string()]));
    assert_eq!(keys(&index, "age = 30 or age NOT IN (30)").len(), 2);
    assert_eq!(keys(&index, "* AND NOT name = Peter"), BTreeSet::from(["DOC_002".to_string()]));
}

#[test]
fn dates_compare_as_instants() {
    let index = persons();
    assert_eq!(keys(&index, "created > 2013-01-01"), BTreeSet::from(["DOC_001".to_string()]));
    assert_eq!(keys(&index, "created < NOW-1d"), BTreeSet::from(["DOC_001".to_string(), "DOC_002".to_string()]));
}

#[test]
fn hits_are_rehydrated_from_source() {
    let index = persons();
    let results = index.search("name = Lars").unwrap();
    assert_eq!(results.len(), 1);
    let hit = &results.hits[0];
    assert_eq!(hit.source["age"], json!(30));
    assert_eq!(hit.source["$contentType"], json!("document"));
    assert!(hit.id.is_some());
}

#[test]
fn blank_and_malformed_queries_are_rejected() {
    let index = persons();
    assert_eq!(index.search("   ").unwrap_err().kind, ErrorKind::InvalidInput);
    assert_eq!(index.search("age = (20").unwrap_err().kind, ErrorKind::Parse);
}

#[test]
fn compiled_queries_are_cached() {
    let index = persons();
    index.search("name = Peter").unwrap();
    index.search("name = Peter").unwrap();
    let stats = index.cache_stats();
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.hit_count, 1);
}

#[test]
fn schemas_track_observed_types() {
    let index = persons();
    let schema = index.schema_json("document").unwrap();
    assert_eq!(schema["properties"]["age"]["type"], json!("integer"));
    assert!(index.field_infos().is_text("name", None));
}

#[test]
fn updates_and_deletes_by_identity() {
    let index = open();
    index.writer().create(vec![
        json!({"$id": "A", "name": "Peter"}),
        json!({"$id": "B", "name": "Lars"}),
    ]).unwrap();
    index.writer().update(vec![json!({"$id": "A", "name": "Paul"})]).unwrap();
    index.writer().delete(["B"]).unwrap();
    index.writer().commit().unwrap();

    let results = index.search("*").unwrap();
    assert_eq!(results.total_hits, 1);
    assert_eq!(results.hits[0].id.as_deref(), Some("A"));
    assert_eq!(results.hits[0].source["name"], json!("Paul"));
}

#[test]
fn failed_conversion_surfaces_at_commit() {
    let index = open();
    index.writer().create(vec![json!("not a document")]).unwrap();
    assert_eq!(index.writer().commit().unwrap_err().kind, ErrorKind::Conversion);

    index.writer().create(vec![json!({"name": "Peter"})]).unwrap();
    assert!(index.writer().commit().is_ok());
    assert_eq!(index.count("name = Peter").unwrap(), 1);
}

#[test]
fn similar_matches_within_edit_distance() {
    let index = persons();
    assert_eq!(keys(&index, "name ~ Pete"), BTreeSet::from(["DOC_001".to_string()]));
    assert_eq!(keys(&index, "* AND name !~ Pete"), BTreeSet::from(["DOC_002".to_string()]));
}

#[test]
fn stop_words_inside_phrases_still_match() {
    let index = open();
    index.field_configuration().set("document", "title", Arc::new(TextStrategy { analyzer: ENGLISH.to_string() }));
    index.writer().create(vec![
        json!({"key": "A", "title": "state-of-the-art"}),
        json!({"key": "B", "title": "art of the state"}),
    ]).unwrap();
    index.writer().commit().unwrap();

    assert_eq!(keys(&index, "title = state-of-the-art"), BTreeSet::from(["A".to_string()]));
    assert_eq!(keys(&index, "title = \"state of the art\""), BTreeSet::from(["A".to_string()]));
}

#[test]
fn update_with_an_unknown_analyzer_keeps_the_original() {
    let index = open();
    index.writer().create(vec![json!({"$id": "A", "title": "first"})]).unwrap();
    index.writer().commit().unwrap();

    index.field_configuration().set("document", "title", Arc::new(TextStrategy { analyzer: "klingon".into() }));
    index.writer().update(vec![json!({"$id": "A", "title": "second"})]).unwrap();
    assert_eq!(index.writer().commit().unwrap_err().kind, ErrorKind::Conversion);

    index.field_configuration().set("document", "title", Arc::new(TextStrategy::default()));
    index.writer().create(vec![json!({"$id": "B", "title": "other"})]).unwrap();
    index.writer().commit().unwrap();

    let results = index.search("title = first").unwrap();
    assert_eq!(results.total_hits, 1);
    assert_eq!(results.hits[0].id.as_deref(), Some("A"));
    assert_eq!(index.num_docs(), 2);
}
