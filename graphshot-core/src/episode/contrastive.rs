use rand::seq::index;
use rand::Rng;

use super::{Episode, Way};
use crate::error::{GraphshotError, Result};
use crate::params::EpisodeParams;
use crate::types::NodeId;

/// Same-node positive pairs.
///
/// Each way is one node drawn uniformly without replacement; its support and
/// query entries are all that same node. Only node identity matters, so the
/// ways are extracted at 0 hops and augmentation supplies the differing views.
#[derive(Debug, Clone)]
pub struct ContrastiveTask {
    dataset_size: usize,
}

impl ContrastiveTask {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }

    pub fn dataset_size(&self) -> usize {
        self.dataset_size
    }

    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        if params.n_way > self.dataset_size {
            return Err(GraphshotError::sampling(format!(
                "cannot draw {} distinct nodes from {}",
                params.n_way, self.dataset_size
            )));
        }

        let ways = index::sample(rng, self.dataset_size, params.n_way)
            .into_iter()
            .map(|i| {
                let node = i as NodeId;
                Way {
                    support: vec![node; params.n_shot],
                    query: vec![node; params.n_query],
                    label: None,
                    hops: Some(0),
                }
            })
            .collect();

        Ok(Episode {
            n_shot: params.n_shot,
            n_query: params.n_query,
            ways,
        })
    }
}
