//! Concurrent access integration tests.
//!
//! Workers share one graph and one neighbor index read-only:
//! - Views derived with different hop counts never affect each other
//! - Racing first builds of the same cache path each publish a complete file
//! - Readers opening an existing cache in parallel see identical neighbors

use candle_core::{DType, Device, Tensor};
use graphshot_core::{build_or_load, CacheOptions, GraphStore, NodeId, SubgraphDataset};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn ring(n: u32) -> GraphStore {
    let features = Tensor::zeros((n as usize, 4), DType::F32, &Device::Cpu).expect("features");
    let edges = (0..n).map(|i| (i, (i + 1) % n)).collect();
    GraphStore::new(features, edges, n as usize).expect("ring graph")
}

/// Threads holding views at different depths over one shared index.
#[test]
fn test_views_at_different_hops_are_independent() {
    let dir = tempdir().expect("Failed to create temp dir");
    let graph = Arc::new(ring(100));
    let view = build_or_load(dir.path().join("adj.safetensors"), Some(graph.as_ref()), 2, CacheOptions::default())
        .expect("Failed to build cache");
    let barrier = Arc::new(Barrier::new(3));

    let handles: Vec<_> = (0..3usize)
        .map(|hops| {
            let dataset = SubgraphDataset::new(Arc::clone(&graph), view.with_hops(hops).expect("view"));
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for seed in 0..100 {
                    let sub = dataset.get_subgraph(&[seed], None).expect("extract");
                    assert_eq!(sub.num_nodes(), 2 * hops + 1, "hops {} seed {}", hops, seed);
                }
                dataset.num_hops()
            })
        })
        .collect();

    for (hops, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().expect("worker panicked"), hops);
    }
    // The original view still has its full depth
    assert_eq!(view.num_hops(), 2);
}

/// Several threads race to build the same missing cache.
#[test]
fn test_racing_first_builds_publish_complete_cache() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = Arc::new(dir.path().join("adj.safetensors"));
    let graph = Arc::new(ring(500));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = Arc::clone(&path);
            let graph = Arc::clone(&graph);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let view = build_or_load(&*path, Some(graph.as_ref()), 2, CacheOptions::default())
                    .expect("build or load");
                view.query(&[0], 2).expect("query")
            })
        })
        .collect();

    let results: Vec<Vec<NodeId>> = handles
        .into_iter()
        .map(|h| h.join().expect("builder panicked"))
        .collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));

    // Whatever file won the race is complete and loadable without a graph
    let reloaded = build_or_load(&*path, None, 2, CacheOptions::default()).expect("reload");
    assert_eq!(reloaded.query(&[0], 2).expect("query"), results[0]);

    // No temporary files are left behind
    let leftovers = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter(|e| {
            e.as_ref()
                .map(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(leftovers, 0);
}

/// Readers load an existing cache concurrently without a graph.
#[test]
fn test_concurrent_cache_readers() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = Arc::new(dir.path().join("adj.safetensors"));
    let built = build_or_load(&*path, Some(&ring(64)), 2, CacheOptions::default()).expect("build");
    let expected: Vec<Vec<NodeId>> = (0..64).map(|n| built.query(&[n], 2).expect("query")).collect();
    let expected = Arc::new(expected);
    let barrier = Arc::new(Barrier::new(3));

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let path = Arc::clone(&path);
            let expected = Arc::clone(&expected);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let view = build_or_load(&*path, None, 2, CacheOptions::default())
                    .unwrap_or_else(|e| panic!("Reader {} failed to load cache: {}", i, e));
                for n in 0..64u32 {
                    assert_eq!(view.query(&[n], 2).expect("query"), expected[n as usize]);
                }
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .join()
            .unwrap_or_else(|_| panic!("Reader thread {} panicked", i));
    }
}
