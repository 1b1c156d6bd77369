//! End-to-end pipeline tests: graph file -> cache -> loader -> batches.

use candle_core::{DType, Device, Tensor};
use graphshot_core::{
    open_dataset, BatchedInput, CacheOptions, DataLoader, DatasetLayout, GraphStore, LabelAssignment,
    LabelInputs, LoaderConfig, NodeId, ParamSampler, Split, TaskKind, DEFAULT_LABEL_SEED,
};
use std::collections::HashSet;
use tempfile::TempDir;

const NUM_NODES: u32 = 200;
const NUM_CLASSES: usize = 20;

/// Ring with chords, half-precision features and labels `node % 20`.
fn write_dataset(dir: &TempDir) -> DatasetLayout {
    let layout = DatasetLayout::new(dir.path());
    let data: Vec<f32> = (0..NUM_NODES as usize * 8).map(|i| (i % 13) as f32).collect();
    let features = Tensor::from_vec(data, (NUM_NODES as usize, 8), &Device::Cpu)
        .unwrap()
        .to_dtype(DType::F16)
        .unwrap();
    let mut edges: Vec<(NodeId, NodeId)> = (0..NUM_NODES).map(|i| (i, (i + 1) % NUM_NODES)).collect();
    edges.extend((0..NUM_NODES).step_by(3).map(|i| (i, (i * 17 + 5) % NUM_NODES)));
    let labels: Vec<i64> = (0..NUM_NODES as i64).map(|n| n % NUM_CLASSES as i64).collect();

    GraphStore::new(features, edges, NUM_NODES as usize)
        .unwrap()
        .with_labels(labels)
        .unwrap()
        .save(layout.graph_path())
        .unwrap();
    layout
}

fn collect(loader: &DataLoader) -> Vec<BatchedInput> {
    loader.iter().collect::<graphshot_core::Result<_>>().unwrap()
}

#[test]
fn test_cached_and_fresh_datasets_serve_identical_batches() {
    let dir = TempDir::new().unwrap();
    let layout = write_dataset(&dir);
    let config = LoaderConfig::new(
        TaskKind::NeighborMatching,
        Split::Train,
        4,
        ParamSampler::fixed(2, 3, 1, 2, 1),
    );

    let fresh = open_dataset(&layout, 2, false, 0, CacheOptions::default()).unwrap();
    assert!(layout.cache_path().exists());
    let reloaded = open_dataset(&layout, 2, false, 0, CacheOptions::default()).unwrap();

    let a = collect(&DataLoader::new(fresh, &config, LabelInputs::default()).unwrap());
    let b = collect(&DataLoader::new(reloaded, &config, LabelInputs::default()).unwrap());
    assert_eq!(a.len(), 4);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.sample_nodes, y.sample_nodes);
        assert_eq!(x.num_edges(), y.num_edges());
        assert_eq!(x.x.dtype(), DType::F32);
    }
}

#[test]
fn test_epochs_repeat_and_splits_differ() {
    let dir = TempDir::new().unwrap();
    let layout = write_dataset(&dir);
    let dataset = open_dataset(&layout, 2, false, 0, CacheOptions::default()).unwrap();
    let params = ParamSampler::fixed(3, 4, 1, 1, 1);

    let train = DataLoader::new(
        dataset.clone(),
        &LoaderConfig::new(TaskKind::SameGraph, Split::Train, 3, params.clone()),
        LabelInputs::default(),
    )
    .unwrap();
    let val = DataLoader::new(
        dataset,
        &LoaderConfig::new(TaskKind::SameGraph, Split::Val, 3, params),
        LabelInputs::default(),
    )
    .unwrap();

    let first: Vec<Vec<NodeId>> = collect(&train).into_iter().map(|b| b.sample_nodes).collect();
    let second: Vec<Vec<NodeId>> = collect(&train).into_iter().map(|b| b.sample_nodes).collect();
    let other: Vec<Vec<NodeId>> = collect(&val).into_iter().map(|b| b.sample_nodes).collect();
    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn test_classification_batches_stay_inside_split_labels() {
    let dir = TempDir::new().unwrap();
    let layout = write_dataset(&dir);
    let dataset = open_dataset(&layout, 1, false, 0, CacheOptions::default()).unwrap();
    let node_labels = dataset.graph().labels().unwrap().to_vec();

    let mut seen = HashSet::new();
    for split in [Split::Train, Split::Val, Split::Test] {
        let assignment =
            LabelAssignment::for_split(node_labels.clone(), NUM_CLASSES, split, false, DEFAULT_LABEL_SEED)
                .unwrap();
        let n_way = if split == Split::Train { 5 } else { 3 };
        let config = LoaderConfig::new(
            TaskKind::Classification,
            split,
            2,
            ParamSampler::fixed(1, n_way, 2, 2, 1),
        );
        let loader = DataLoader::new(
            dataset.clone(),
            &config,
            LabelInputs {
                assignment: Some(&assignment),
                label_meta: None,
            },
        )
        .unwrap();

        let mut split_labels = HashSet::new();
        for batch in collect(&loader) {
            for node in batch.sample_nodes {
                let label = assignment.label_of(node).unwrap();
                assert!(assignment.label_set().contains(&label));
                split_labels.insert(label);
            }
        }
        // No label is served to two splits
        assert!(seen.is_disjoint(&split_labels), "{} overlaps", split);
        seen.extend(split_labels);
    }
}
