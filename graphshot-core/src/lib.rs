//! graphshot-core: few-shot episode sampling over large citation graphs.
//!
//! This crate loads a graph, caches a multi-hop neighbor index on disk,
//! partitions class labels into train/val/test sets, and serves episodic
//! (N-way, K-shot) batches of per-node subgraphs.
//!
//! # Architecture
//!
//! ```text
//! BatchSampler (seeded) -> ParamSampler -> EpisodeTask -> BatchPlan
//!                                                            |
//!        GraphStore + NeighborView (cache) -> SubgraphExtractor (per node)
//!                                                            |
//!                                                  Collator -> BatchedInput
//! ```
//!
//! # Example
//!
//! ```ignore
//! use graphshot_core::{
//!     open_dataset, DataLoader, DatasetLayout, LoaderConfig, ParamSampler, Split, TaskKind,
//! };
//!
//! let dataset = open_dataset(&DatasetLayout::new("data/mag240m"), 2, false, 0, Default::default())?;
//! let config = LoaderConfig::new(TaskKind::NeighborMatching, Split::Train, 100, ParamSampler::fixed(5, 3, 3, 24, 1));
//! let loader = DataLoader::new(dataset, &config, Default::default())?;
//! for batch in &loader {
//!     let batch = batch?;
//! }
//! ```

pub mod augment;
pub mod batch;
pub mod collate;
pub mod dataset;
pub mod episode;
pub mod error;
pub mod graph;
pub mod labels;
pub mod loader;
pub mod neighbor;
pub mod params;
pub mod subgraph;
pub mod types;

pub use augment::{get_aug, Augmentation};
pub use batch::{BatchPlan, BatchSampler, EpisodeSpan};
pub use collate::{BatchedInput, Collator, LabelMeta, LABEL_META_DIM};
pub use dataset::{open_dataset, DatasetLayout, SubgraphDataset, DEFAULT_SUBSET_SIZE};
pub use episode::{
    ContrastiveTask, Episode, EpisodeTask, MultiTaskSplitBatch, MultiTaskSplitWay, MulticlassTask,
    NeighborTask, Way, WeightedTask,
};
pub use error::{GraphshotError, Result};
pub use graph::{GraphFingerprint, GraphStore};
pub use labels::{
    partition, LabelAssignment, LabelId, LabelPartition, CS_ARXIV_LABELS, DEFAULT_LABEL_SEED,
    TEST_VAL_LENGTH,
};
pub use loader::{DataLoader, LabelInputs, LoaderConfig};
pub use neighbor::{build_or_load, CacheOptions, NeighborIndex, NeighborView};
pub use params::{EpisodeParams, ParamRange, ParamSampler};
pub use subgraph::{Subgraph, SubgraphExtractor};
pub use types::{NeighborMode, NodeId, Split, TaskKind};

/// Library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
