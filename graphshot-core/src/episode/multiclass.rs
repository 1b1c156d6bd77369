use rand::seq::index;
use rand::Rng;
use std::sync::Arc;

use super::{Episode, Way};
use crate::error::{GraphshotError, Result};
use crate::labels::{LabelAssignment, LabelId};
use crate::params::EpisodeParams;
use crate::types::NodeId;

/// Label classification over one split's label set.
///
/// Each way is a label with at least `n_shot + n_query` nodes; its support
/// and query nodes are disjoint draws from that label's nodes.
#[derive(Debug, Clone)]
pub struct MulticlassTask {
    groups: Arc<Vec<(LabelId, Vec<NodeId>)>>,
}

impl MulticlassTask {
    pub fn new(assignment: &LabelAssignment) -> Self {
        Self::from_groups(assignment.nodes_by_label().into_iter().collect())
    }

    /// Build from `(label, nodes)` groups, kept in the given order.
    pub fn from_groups(groups: Vec<(LabelId, Vec<NodeId>)>) -> Self {
        Self {
            groups: Arc::new(groups),
        }
    }

    pub fn num_labels(&self) -> usize {
        self.groups.len()
    }

    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        let required = params.nodes_per_way();
        let eligible: Vec<&(LabelId, Vec<NodeId>)> = self
            .groups
            .iter()
            .filter(|(_, nodes)| nodes.len() >= required)
            .collect();
        if eligible.len() < params.n_way {
            return Err(GraphshotError::sampling(format!(
                "{} labels have at least {} nodes, need {} ways",
                eligible.len(),
                required,
                params.n_way
            )));
        }

        let mut ways = Vec::with_capacity(params.n_way);
        for i in index::sample(rng, eligible.len(), params.n_way) {
            let (label, nodes) = eligible[i];
            let picked: Vec<NodeId> = index::sample(rng, nodes.len(), required)
                .into_iter()
                .map(|j| nodes[j])
                .collect();
            let (support, query) = picked.split_at(params.n_shot);
            ways.push(Way {
                support: support.to_vec(),
                query: query.to_vec(),
                label: Some(*label),
                hops: None,
            });
        }

        Ok(Episode {
            n_shot: params.n_shot,
            n_query: params.n_query,
            ways,
        })
    }
}
