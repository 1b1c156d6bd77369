//! Episode tasks: policies that turn batch parameters into node ids.
//!
//! # Architecture
//!
//! ```text
//! EpisodeTask (closed enum)
//!   ├── Contrastive   same-node positive pairs, extracted at 0 hops
//!   ├── Neighbor      support/query drawn from a seed's 2-hop neighborhood
//!   ├── Multiclass    support/query drawn from nodes of n_way labels
//!   ├── SplitWay      n_way divided across sub-tasks, ways concatenated
//!   └── SplitBatch    episode count divided across sub-tasks, batches concatenated
//! ```
//!
//! An [`Episode`] is a list of ways. Each way owns its support and query
//! nodes, an optional class label, and an optional hop override used when
//! its nodes are extracted.

mod contrastive;
mod multi;
mod multiclass;
mod neighbor;

pub use contrastive::ContrastiveTask;
pub use multi::{MultiTaskSplitBatch, MultiTaskSplitWay, WeightedTask};
pub use multiclass::MulticlassTask;
pub use neighbor::NeighborTask;

use rand::Rng;
use serde::Serialize;

use crate::error::Result;
use crate::labels::LabelId;
use crate::params::EpisodeParams;
use crate::types::NodeId;

/// One class of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Way {
    pub support: Vec<NodeId>,
    pub query: Vec<NodeId>,
    /// Class label, when the way stands for a real label.
    pub label: Option<LabelId>,
    /// Extraction depth override for this way's nodes.
    pub hops: Option<usize>,
}

/// One few-shot sampling unit: `n_way` ways of `n_shot` support and
/// `n_query` query nodes each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Episode {
    pub n_shot: usize,
    pub n_query: usize,
    pub ways: Vec<Way>,
}

impl Episode {
    pub fn n_way(&self) -> usize {
        self.ways.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.n_way() * (self.n_shot + self.n_query)
    }

    /// Node ids in collation order: all support nodes way by way, then all
    /// query nodes way by way.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.num_nodes());
        for way in &self.ways {
            nodes.extend_from_slice(&way.support);
        }
        for way in &self.ways {
            nodes.extend_from_slice(&way.query);
        }
        nodes
    }

    /// `(way index, is_query, hop override)` for each node, aligned with [`Episode::node_ids`].
    pub fn node_roles(&self) -> Vec<(usize, bool, Option<usize>)> {
        let mut roles = Vec::with_capacity(self.num_nodes());
        for (w, way) in self.ways.iter().enumerate() {
            roles.extend(std::iter::repeat((w, false, way.hops)).take(way.support.len()));
        }
        for (w, way) in self.ways.iter().enumerate() {
            roles.extend(std::iter::repeat((w, true, way.hops)).take(way.query.len()));
        }
        roles
    }

    /// Concatenate the ways of episodes sharing shot and query counts.
    pub fn concat(episodes: Vec<Episode>) -> Option<Episode> {
        let mut iter = episodes.into_iter();
        let mut merged = iter.next()?;
        for episode in iter {
            if episode.n_shot != merged.n_shot || episode.n_query != merged.n_query {
                return None;
            }
            merged.ways.extend(episode.ways);
        }
        Some(merged)
    }
}

/// The closed set of episode-sampling policies.
#[derive(Debug, Clone)]
pub enum EpisodeTask {
    Contrastive(ContrastiveTask),
    Neighbor(NeighborTask),
    Multiclass(MulticlassTask),
    SplitWay(MultiTaskSplitWay),
    SplitBatch(MultiTaskSplitBatch),
}

impl EpisodeTask {
    pub fn name(&self) -> &'static str {
        match self {
            EpisodeTask::Contrastive(_) => "contrastive",
            EpisodeTask::Neighbor(_) => "neighbor",
            EpisodeTask::Multiclass(_) => "multiclass",
            EpisodeTask::SplitWay(_) => "split_way",
            EpisodeTask::SplitBatch(_) => "split_batch",
        }
    }

    /// Sample one episode with `params.n_way` ways.
    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        match self {
            EpisodeTask::Contrastive(task) => task.sample_episode(rng, params),
            EpisodeTask::Neighbor(task) => task.sample_episode(rng, params),
            EpisodeTask::Multiclass(task) => task.sample_episode(rng, params),
            EpisodeTask::SplitWay(task) => task.sample_episode(rng, params),
            EpisodeTask::SplitBatch(task) => task.sample_episode(rng, params),
        }
    }

    /// Sample `params.episodes_per_batch()` episodes for one batch.
    pub fn sample_batch<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Vec<Episode>> {
        match self {
            EpisodeTask::SplitBatch(task) => task.sample_batch(rng, params),
            _ => (0..params.episodes_per_batch())
                .map(|_| self.sample_episode(rng, params))
                .collect(),
        }
    }
}

impl From<ContrastiveTask> for EpisodeTask {
    fn from(task: ContrastiveTask) -> Self {
        EpisodeTask::Contrastive(task)
    }
}

impl From<NeighborTask> for EpisodeTask {
    fn from(task: NeighborTask) -> Self {
        EpisodeTask::Neighbor(task)
    }
}

impl From<MulticlassTask> for EpisodeTask {
    fn from(task: MulticlassTask) -> Self {
        EpisodeTask::Multiclass(task)
    }
}

impl From<MultiTaskSplitWay> for EpisodeTask {
    fn from(task: MultiTaskSplitWay) -> Self {
        EpisodeTask::SplitWay(task)
    }
}

impl From<MultiTaskSplitBatch> for EpisodeTask {
    fn from(task: MultiTaskSplitBatch) -> Self {
        EpisodeTask::SplitBatch(task)
    }
}

/// Split `total` across `weights` by largest remainder.
///
/// Shares always sum to `total`; ties go to the earlier entry.
pub(crate) fn apportion(total: usize, weights: &[f64]) -> Vec<usize> {
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || sum <= 0.0 {
        return vec![0; weights.len()];
    }

    let exact: Vec<f64> = weights.iter().map(|w| total as f64 * w / sum).collect();
    let mut shares: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let assigned: usize = shares.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for &i in order.iter().take(total.saturating_sub(assigned)) {
        shares[i] += 1;
    }
    shares
}
