//! Data loader: task selection, batch planning and parallel collation.
//!
//! Batches are planned sequentially from the seeded [`BatchSampler`], so the
//! node ids of every batch are fixed before any worker runs. Extraction and
//! collation then fan out over a rayon pool, `num_workers` batches at a
//! time, and results come back in plan order.

use candle_core::Tensor;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::augment::{get_aug, Augmentation};
use crate::batch::{BatchPlan, BatchSampler, Batches};
use crate::collate::{BatchedInput, Collator, LabelMeta};
use crate::dataset::SubgraphDataset;
use crate::episode::{ContrastiveTask, EpisodeTask, MulticlassTask, NeighborTask};
use crate::error::{GraphshotError, Result};
use crate::labels::LabelAssignment;
use crate::params::ParamSampler;
use crate::subgraph::Subgraph;
use crate::types::{NeighborMode, NodeId, Split, TaskKind};

/// Loader settings for one split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub task: TaskKind,
    pub split: Split,
    pub batch_count: usize,
    pub params: ParamSampler,
    /// Batches extracted in parallel; 0 loads in the calling thread.
    pub num_workers: usize,
    /// Augmentation policy name.
    pub aug: String,
    /// Augment val and test batches too.
    pub aug_test: bool,
    /// Overrides the split-derived sampler seed.
    pub seed: Option<u64>,
}

impl LoaderConfig {
    pub fn new(task: TaskKind, split: Split, batch_count: usize, params: ParamSampler) -> Self {
        Self {
            task,
            split,
            batch_count,
            params,
            num_workers: 0,
            aug: String::new(),
            aug_test: false,
            seed: None,
        }
    }

    /// Sampler seed: the explicit override or the split's default.
    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| self.split.default_seed())
    }
}

/// Extra inputs for label-aware tasks.
#[derive(Debug, Clone, Default)]
pub struct LabelInputs<'a> {
    /// Node labels resolved for the loader's split.
    pub assignment: Option<&'a LabelAssignment>,
    /// `[num_classes, dim]` label features.
    pub label_meta: Option<Tensor>,
}

/// Serves collated batches for one split and task.
#[derive(Debug)]
pub struct DataLoader {
    dataset: SubgraphDataset,
    sampler: BatchSampler,
    collator: Collator,
    pool: Option<rayon::ThreadPool>,
    chunk: usize,
}

impl DataLoader {
    /// Wire up the task, sampler, augmentation and worker pool for `config`.
    ///
    /// # Errors
    ///
    /// - `Config` for invalid parameters or a classification task without labels
    /// - `HopLimitExceeded` if neighbor matching needs more hops than the cache holds
    /// - `UnknownAugmentation` for a bad augmentation name
    pub fn new(dataset: SubgraphDataset, config: &LoaderConfig, labels: LabelInputs<'_>) -> Result<Self> {
        config.params.validate()?;

        let augment = config.split.augments_by_default() || config.aug_test;
        let aug = if augment {
            get_aug(&config.aug, Some(dataset.graph().features()))?
        } else {
            Augmentation::identity()
        };

        let (task, label_meta): (EpisodeTask, LabelMeta) = match config.task {
            TaskKind::SameGraph => (ContrastiveTask::new(dataset.len()).into(), LabelMeta::zeros()),
            TaskKind::NeighborMatching => {
                let view = dataset.view().with_hops(NeighborTask::DEFAULT_HOPS)?;
                let task = NeighborTask::new(view, dataset.len(), NeighborMode::InOut);
                (task.into(), LabelMeta::zeros())
            }
            TaskKind::Classification => {
                let assignment = labels.assignment.ok_or_else(|| {
                    GraphshotError::config("classification task needs node labels")
                })?;
                if assignment.num_nodes() != dataset.len() {
                    return Err(GraphshotError::config(format!(
                        "{} node labels for a graph of {} nodes",
                        assignment.num_nodes(),
                        dataset.len()
                    )));
                }
                let meta = match labels.label_meta {
                    Some(meta) => LabelMeta::Dense(meta),
                    None => LabelMeta::zeros(),
                };
                (MulticlassTask::new(assignment).into(), meta)
            }
        };

        let seed = config.seed();
        let sampler = BatchSampler::new(config.batch_count, task, config.params.clone(), seed);

        let pool = if config.num_workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.num_workers)
                .thread_name(|i| format!("graphshot-loader-{}", i))
                .build()
                .map_err(|e| GraphshotError::config(format!("failed to create worker pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        info!(
            "Data loader: task={} split={} batches={} seed={} aug={} workers={}",
            config.task, config.split, config.batch_count, seed, aug, config.num_workers
        );

        Ok(Self {
            dataset,
            sampler,
            collator: Collator::new(label_meta, aug),
            pool,
            chunk: config.num_workers.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.sampler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }

    pub fn sampler(&self) -> &BatchSampler {
        &self.sampler
    }

    pub fn dataset(&self) -> &SubgraphDataset {
        &self.dataset
    }

    /// Start a pass over the batches.
    pub fn iter(&self) -> LoaderIter<'_> {
        LoaderIter {
            loader: self,
            plans: self.sampler.iter(),
            ready: VecDeque::new(),
            failed: false,
        }
    }

    /// Extract every node's subgraph for `plan` and collate them.
    pub fn load_batch(&self, plan: &BatchPlan) -> Result<BatchedInput> {
        let mut requests: Vec<(NodeId, Option<usize>)> = Vec::with_capacity(plan.num_nodes());
        for episode in &plan.episodes {
            let nodes = episode.node_ids();
            requests.extend(nodes.into_iter().zip(episode.node_roles()).map(|(n, (_, _, hops))| (n, hops)));
        }

        // Inside a worker pool the per-node extractions share its threads.
        let subgraphs: Vec<Subgraph> = if self.pool.is_some() {
            requests
                .par_iter()
                .map(|&(node, hops)| self.dataset.get_subgraph(&[node], hops))
                .collect::<Result<_>>()?
        } else {
            requests
                .iter()
                .map(|&(node, hops)| self.dataset.get_subgraph(&[node], hops))
                .collect::<Result<_>>()?
        };
        self.collator.collate(plan, subgraphs)
    }

    fn load_chunk(&self, plans: Vec<BatchPlan>) -> Vec<Result<BatchedInput>> {
        match &self.pool {
            Some(pool) => pool.install(|| plans.par_iter().map(|p| self.load_batch(p)).collect()),
            None => plans.iter().map(|p| self.load_batch(p)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Result<BatchedInput>;
    type IntoIter = LoaderIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`DataLoader`]. Ends after `batch_count` batches or the
/// first error, whether it came from planning or from loading.
#[derive(Debug)]
pub struct LoaderIter<'a> {
    loader: &'a DataLoader,
    plans: Batches<'a>,
    ready: VecDeque<Result<BatchedInput>>,
    failed: bool,
}

impl Iterator for LoaderIter<'_> {
    type Item = Result<BatchedInput>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.ready.is_empty() {
            let mut plans = Vec::with_capacity(self.loader.chunk);
            let mut planning_error = None;
            for plan in self.plans.by_ref().take(self.loader.chunk) {
                match plan {
                    Ok(plan) => plans.push(plan),
                    Err(e) => {
                        planning_error = Some(e);
                        break;
                    }
                }
            }
            if !plans.is_empty() {
                debug!("Loading {} batches starting at {}", plans.len(), plans[0].index);
            }
            self.ready.extend(self.loader.load_chunk(plans));
            if let Some(e) = planning_error {
                self.ready.push_back(Err(e));
            }
        }
        let item = self.ready.pop_front()?;
        if item.is_err() {
            self.failed = true;
            self.ready.clear();
        }
        Some(item)
    }
}

impl std::iter::FusedIterator for LoaderIter<'_> {}
