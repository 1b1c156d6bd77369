//! Batch sampling: a fixed number of reproducible batches per pass.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;

use crate::episode::{Episode, EpisodeTask};
use crate::error::Result;
use crate::params::{EpisodeParams, ParamSampler};
use crate::types::NodeId;

/// Position of one episode's nodes inside a batch's flat node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeSpan {
    /// Offset of the episode's first node.
    pub start: usize,
    pub n_way: usize,
    pub n_shot: usize,
    pub n_query: usize,
}

impl EpisodeSpan {
    pub fn len(&self) -> usize {
        self.n_way * (self.n_shot + self.n_query)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Range of the support nodes (way-major).
    pub fn support(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.n_way * self.n_shot
    }

    /// Range of the query nodes (way-major).
    pub fn query(&self) -> std::ops::Range<usize> {
        self.start + self.n_way * self.n_shot..self.start + self.len()
    }
}

/// Everything the collator needs to know about one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    /// Position of the batch within the pass.
    pub index: usize,
    pub params: EpisodeParams,
    pub episodes: Vec<Episode>,
    /// Seed for this batch's feature augmentation.
    pub augment_seed: u64,
}

impl BatchPlan {
    /// Flat node ids: episodes in order, each laid out as in [`Episode::node_ids`].
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.episodes.iter().flat_map(|e| e.node_ids()).collect()
    }

    pub fn num_nodes(&self) -> usize {
        self.episodes.iter().map(|e| e.num_nodes()).sum()
    }

    pub fn spans(&self) -> Vec<EpisodeSpan> {
        let mut start = 0;
        self.episodes
            .iter()
            .map(|e| {
                let span = EpisodeSpan {
                    start,
                    n_way: e.n_way(),
                    n_shot: e.n_shot,
                    n_query: e.n_query,
                };
                start += span.len();
                span
            })
            .collect()
    }
}

/// Finite, restartable sequence of `batch_count` batches.
///
/// Every call to [`BatchSampler::iter`] re-seeds from `seed`, so repeated
/// passes yield identical batches.
#[derive(Debug, Clone)]
pub struct BatchSampler {
    batch_count: usize,
    task: EpisodeTask,
    params: ParamSampler,
    seed: u64,
}

impl BatchSampler {
    pub fn new(batch_count: usize, task: EpisodeTask, params: ParamSampler, seed: u64) -> Self {
        Self {
            batch_count,
            task,
            params,
            seed,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn task(&self) -> &EpisodeTask {
        &self.task
    }

    pub fn len(&self) -> usize {
        self.batch_count
    }

    pub fn is_empty(&self) -> bool {
        self.batch_count == 0
    }

    /// Start a new pass.
    pub fn iter(&self) -> Batches<'_> {
        Batches {
            sampler: self,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            next: 0,
            failed: false,
        }
    }

    fn plan(&self, rng: &mut ChaCha8Rng, index: usize) -> Result<BatchPlan> {
        let params = self.params.sample(rng);
        let episodes = self.task.sample_batch(rng, &params)?;
        let augment_seed = rng.gen();
        debug!(
            "Planned batch {} ({}): {} episodes, {}-way {}-shot {}-query",
            index,
            self.task.name(),
            episodes.len(),
            params.n_way,
            params.n_shot,
            params.n_query
        );
        Ok(BatchPlan {
            index,
            params,
            episodes,
            augment_seed,
        })
    }
}

impl<'a> IntoIterator for &'a BatchSampler {
    type Item = Result<BatchPlan>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`BatchSampler`]. Ends after `batch_count` batches or the
/// first error.
#[derive(Debug)]
pub struct Batches<'a> {
    sampler: &'a BatchSampler,
    rng: ChaCha8Rng,
    next: usize,
    failed: bool,
}

impl Iterator for Batches<'_> {
    type Item = Result<BatchPlan>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.sampler.batch_count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let plan = self.sampler.plan(&mut self.rng, index);
        self.failed = plan.is_err();
        Some(plan)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.failed {
            0
        } else {
            self.sampler.batch_count - self.next
        };
        (0, Some(remaining))
    }
}

impl std::iter::FusedIterator for Batches<'_> {}
