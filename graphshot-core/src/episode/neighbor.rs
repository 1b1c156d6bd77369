use rand::seq::index;
use rand::Rng;

use super::{Episode, Way};
use crate::error::{GraphshotError, Result};
use crate::neighbor::NeighborView;
use crate::params::EpisodeParams;
use crate::types::{NeighborMode, NodeId};

/// Neighbor matching: each way is a seed node, and its support and query
/// nodes are disjoint draws from the seed's neighborhood.
///
/// The neighborhood excludes the seed itself. No resampling is attempted
/// when a seed's neighborhood is too small.
#[derive(Debug, Clone)]
pub struct NeighborTask {
    view: NeighborView,
    num_nodes: usize,
}

impl NeighborTask {
    /// Hops of the neighborhood the task draws from.
    pub const DEFAULT_HOPS: usize = 2;

    /// `view` is re-scoped to `mode`; its hop count sets the neighborhood depth.
    pub fn new(view: NeighborView, num_nodes: usize, mode: NeighborMode) -> Self {
        Self {
            view: view.with_mode(mode),
            num_nodes,
        }
    }

    pub fn view(&self) -> &NeighborView {
        &self.view
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        if params.n_way > self.num_nodes {
            return Err(GraphshotError::sampling(format!(
                "cannot draw {} distinct seeds from {} nodes",
                params.n_way, self.num_nodes
            )));
        }

        let required = params.nodes_per_way();
        let mut ways = Vec::with_capacity(params.n_way);
        for i in index::sample(rng, self.num_nodes, params.n_way) {
            let seed = i as NodeId;
            let neighborhood = self.view.neighborhood(seed)?;
            if neighborhood.len() < required {
                return Err(GraphshotError::InsufficientNeighborhood {
                    node: seed,
                    available: neighborhood.len(),
                    required,
                });
            }

            let picked: Vec<NodeId> = index::sample(rng, neighborhood.len(), required)
                .into_iter()
                .map(|j| neighborhood[j])
                .collect();
            let (support, query) = picked.split_at(params.n_shot);
            ways.push(Way {
                support: support.to_vec(),
                query: query.to_vec(),
                label: None,
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
