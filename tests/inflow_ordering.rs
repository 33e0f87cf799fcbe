use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use parking_lot::Mutex;
use serde_json::{json, Value};
use jsondex::{Config, JsonIndex};
use jsondex::inflow::capacity::CapacityControl;
use jsondex::inflow::slot::SlotChain;

#[test]
fn chunks_completed_in_reverse_are_delivered_in_order() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let chain = SlotChain::new(move |chunk: Vec<usize>| sink.lock().extend(chunk));

    let root = chain.reserve();
    let items: Vec<usize> = (0..600).collect();
    let slots: Vec<_> = items.chunks(250).map(|chunk| (root.split(), chunk.to_vec())).collect();
    assert_eq!(slots.len(), 3);
    root.ready(Vec::new());

    let handles: Vec<_> = slots.into_iter().rev().enumerate()
        .map(|(i, (slot, chunk))| thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(5 * i as u64));
            slot.ready(chunk);
        }))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*delivered.lock(), items);
    assert_eq!(chain.pending(), 0);
}

#[test]
fn capacity_check_admits_up_to_the_ceiling() {
    let control = Arc::new(CapacityControl::new(20));
    let admitted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let control = control.clone();
            let admitted = admitted.clone();
            thread::spawn(move || {
                control.check_capacity(|| {
                    admitted.fetch_add(1, Ordering::SeqCst);
                    control.increment(1);
                });
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 20);
    assert_eq!(control.in_flight(), 20);
}

#[test]
fn concurrent_workers_keep_submission_order() {
    let index = JsonIndex::open(Config { worker_threads: 4, batch_size: 50, ..Config::default() }).unwrap();
    let docs: Vec<Value> = (0..600).map(|n| json!({"$id": format!("DOC_{:04}", n), "n": n})).collect();
    index.writer().create(docs).unwrap();
    index.writer().commit().unwrap();

    let results = index.search("*").unwrap();
    let order: Vec<i64> = results.values_of("n").filter_map(Value::as_i64).collect();
    assert_eq!(order, (0..600).collect::<Vec<_>>());
}

#[test]
fn ingest_feeds_documents_through_the_scheduler() {
    let index = JsonIndex::open(Config { worker_threads: 2, batch_size: 7, ..Config::default() }).unwrap();
    let docs = (0..100).map(|n| json!({"n": n, "even": n % 2 == 0}));
    assert_eq!(index.writer().ingest(docs).wait().unwrap(), 100);
    index.writer().commit().unwrap();

    assert_eq!(index.count("*").unwrap(), 100);
    assert_eq!(index.count("even = true").unwrap(), 50);
}
