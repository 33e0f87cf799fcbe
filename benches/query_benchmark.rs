use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jsondex::core::config::Config;
use jsondex::core::index::JsonIndex;
use jsondex::document::builder::DocumentBuilder;
use jsondex::fields::configuration::FieldConfiguration;
use jsondex::query::ast::BooleanOperator;
use jsondex::query::optimizer::optimize;
use jsondex::query::parser::parse;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

const QUERIES: &[&str] = &[
    "age = 20 and name = Peter",
    "age = 30 or name = Peter",
    "name: \"quick brown\" age >= 18 ORDER BY age DESC",
    "city IN (Copenhagen, Aarhus, Odense) AND NOT tags = archived",
    "created > NOW-7d and (title: fox* or title ~ jumsp)",
];

/// Helper to create a person-shaped test document
fn create_person(id: usize) -> Value {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let title: Vec<&str> = (0..12).map(|_| words[rng.gen_range(0..words.len())]).collect();
    json!({
        "$id": format!("DOC_{:06}", id),
        "name": format!("Person {}", id),
        "age": rng.gen_range(18..90),
        "title": title.join(" "),
        "tags": ["a", "b", format!("group_{}", id % 10)],
        "created": "2024-05-01T12:00:00Z",
        "address": { "city": "Copenhagen", "zip": 2100 + (id % 50) },
    })
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_optimize");
    for (i, query) in QUERIES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), query, |b, query| {
            b.iter(|| optimize(parse(black_box(query)).unwrap(), BooleanOperator::Or));
        });
    }
    group.finish();
}

fn bench_document_projection(c: &mut Criterion) {
    let builder = DocumentBuilder::new(&Config::default(), Arc::new(FieldConfiguration::default()));
    let doc = create_person(1);
    c.bench_function("document_projection", |b| {
        b.iter(|| builder.build(black_box(&doc)).unwrap());
    });
}

fn bench_search(c: &mut Criterion) {
    let index = JsonIndex::open(Config::default()).unwrap();
    index.writer().create((0..5_000).map(create_person).collect()).unwrap();
    index.writer().commit().unwrap();

    let mut group = c.benchmark_group("search");
    for query in ["age >= 40 and age < 50", "title: fox", "* ORDER BY age DESC"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), query, |b, query| {
            b.iter(|| index.search_with_limit(black_box(query), 10).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_document_projection, bench_search);
criterion_main!(benches);
