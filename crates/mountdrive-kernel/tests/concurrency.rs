//! Concurrent access to the in-memory backend.

mod common;

use common::{make_dir, open_file, read_all};
use mountdrive_contract::{FileMode, RequestMeta, StorageOps, WriteOffset};
use mountdrive_kernel::MemoryStorage;
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

/// One positioned write.
#[derive(Debug, Clone)]
struct PositionedWrite {
    offset: u64,
    data: Vec<u8>,
}

fn writes() -> impl Strategy<Value = Vec<PositionedWrite>> {
    prop::collection::vec(
        (0u64..512, prop::collection::vec(any::<u8>(), 1..64))
            .prop_map(|(offset, data)| PositionedWrite { offset, data }),
        1..40,
    )
}

/// Apply writes to a plain buffer the way the store should.
fn model(writes: &[PositionedWrite]) -> Vec<u8> {
    let mut buf = Vec::new();
    for write in writes {
        let start = write.offset as usize;
        let end = start + write.data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(&write.data);
    }
    buf
}

fn run_writer(store: Arc<MemoryStorage>, meta: RequestMeta, writes: Vec<PositionedWrite>, barrier: Arc<Barrier>) {
    barrier.wait();
    for write in &writes {
        let written = store
            .write_file(&meta, &write.data, WriteOffset::At(write.offset))
            .unwrap();
        assert_eq!(written, write.data.len());
        thread::yield_now();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_concurrent_writers_keep_files_intact(left in writes(), right in writes()) {
        let store = Arc::new(MemoryStorage::new());
        let a = open_file(&*store, &["a.bin"], FileMode::CreateNew);
        let b = open_file(&*store, &["b.bin"], FileMode::CreateNew);
        let barrier = Arc::new(Barrier::new(2));

        let handles = [
            (a.clone(), left.clone()),
            (b.clone(), right.clone()),
        ]
        .map(|(meta, writes)| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || run_writer(store, meta, writes, barrier))
        });
        for handle in handles {
            handle.join().unwrap();
        }

        prop_assert_eq!(read_all(&*store, &a), model(&left));
        prop_assert_eq!(read_all(&*store, &b), model(&right));
        let used = (model(&left).len() + model(&right).len()) as u64;
        prop_assert_eq!(store.used_space(), used);
    }
}

#[test]
fn test_structural_churn_with_io() {
    let store = Arc::new(MemoryStorage::new());
    make_dir(&*store, &["shared"]);
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..200 {
                    let name = format!("w{worker}_{round}");
                    let meta = open_file(&*store, &["shared", name.as_str()], FileMode::CreateNew);
                    store
                        .write_file(&meta, name.as_bytes(), WriteOffset::At(0))
                        .unwrap();
                    assert_eq!(read_all(&*store, &meta), name.as_bytes());
                    if round % 2 == 0 {
                        store.cleanup(&meta, true);
                    }
                    // Listing races with other workers' creates and deletes.
                    store
                        .get_file_list(&RequestMeta::directory(["shared"]))
                        .unwrap();
                    store.free_space();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let remaining = store
        .get_file_list(&RequestMeta::directory(["shared"]))
        .unwrap();
    assert_eq!(remaining.len(), 4 * 100);
    let expected: u64 = remaining.iter().map(|info| info.length).sum();
    assert_eq!(store.used_space(), expected);
}

#[test]
fn test_delete_during_writes_reports_not_found() {
    let store = Arc::new(MemoryStorage::new());
    let meta = open_file(&*store, &["victim"], FileMode::CreateNew);

    let writer = {
        let store = Arc::clone(&store);
        let meta = meta.clone();
        thread::spawn(move || {
            let mut outcomes = Vec::new();
            for i in 0..10_000u64 {
                outcomes.push(store.write_file(&meta, b"x", WriteOffset::At(i % 64)).is_ok());
            }
            outcomes
        })
    };
    store.cleanup(&meta, true);
    let outcomes = writer.join().unwrap();

    // Once the delete lands, every later write fails.
    let first_failure = outcomes.iter().position(|ok| !ok).unwrap_or(outcomes.len());
    assert!(outcomes[first_failure..].iter().all(|ok| !ok));
    assert_eq!(store.used_space(), 0);
}
