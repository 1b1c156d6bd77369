//! Multi-task combinators.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{apportion, Episode, EpisodeTask};
use crate::error::{GraphshotError, Result};
use crate::params::EpisodeParams;

/// A sub-task and its share of the budget.
#[derive(Debug, Clone)]
pub struct WeightedTask {
    pub task: EpisodeTask,
    pub weight: f64,
}

impl WeightedTask {
    pub fn new(task: impl Into<EpisodeTask>, weight: f64) -> Self {
        Self {
            task: task.into(),
            weight,
        }
    }
}

fn check_weights(tasks: &[WeightedTask]) -> Result<Vec<f64>> {
    if tasks.is_empty() {
        return Err(GraphshotError::config("multi-task needs at least one sub-task"));
    }
    let weights: Vec<f64> = tasks.iter().map(|t| t.weight).collect();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(GraphshotError::config(format!(
            "multi-task weights must be non-negative with a positive sum, got {:?}",
            weights
        )));
    }
    Ok(weights)
}

/// Divides the `n_way` budget of each episode across sub-tasks and
/// concatenates their ways into one episode.
#[derive(Debug, Clone)]
pub struct MultiTaskSplitWay {
    tasks: Vec<WeightedTask>,
    weights: Vec<f64>,
}

impl MultiTaskSplitWay {
    pub fn new(tasks: Vec<WeightedTask>) -> Result<Self> {
        let weights = check_weights(&tasks)?;
        Ok(Self { tasks, weights })
    }

    pub fn tasks(&self) -> &[WeightedTask] {
        &self.tasks
    }

    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        let shares = apportion(params.n_way, &self.weights);
        let mut parts = Vec::with_capacity(self.tasks.len());
        for (sub, &n_way) in self.tasks.iter().zip(&shares) {
            if n_way > 0 {
                parts.push(sub.task.sample_episode(rng, &params.with_way(n_way))?);
            }
        }

        Ok(Episode::concat(parts).unwrap_or(Episode {
            n_shot: params.n_shot,
            n_query: params.n_query,
            ways: Vec::new(),
        }))
    }
}

/// Divides the episodes of each batch across sub-tasks and concatenates
/// the sub-batches in sub-task order.
#[derive(Debug, Clone)]
pub struct MultiTaskSplitBatch {
    tasks: Vec<WeightedTask>,
    weights: Vec<f64>,
    chooser: WeightedIndex<f64>,
}

impl MultiTaskSplitBatch {
    pub fn new(tasks: Vec<WeightedTask>) -> Result<Self> {
        let weights = check_weights(&tasks)?;
        let chooser = WeightedIndex::new(&weights)
            .map_err(|e| GraphshotError::config(format!("invalid multi-task weights: {}", e)))?;
        Ok(Self {
            tasks,
            weights,
            chooser,
        })
    }

    pub fn tasks(&self) -> &[WeightedTask] {
        &self.tasks
    }

    /// A single episode from one sub-task picked by weight.
    pub fn sample_episode<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Episode> {
        let pick = self.chooser.sample(rng);
        self.tasks[pick].task.sample_episode(rng, params)
    }

    pub fn sample_batch<R: Rng + ?Sized>(&self, rng: &mut R, params: &EpisodeParams) -> Result<Vec<Episode>> {
        let shares = apportion(params.episodes_per_batch(), &self.weights);
        let mut episodes = Vec::with_capacity(params.episodes_per_batch());
        for (sub, &count) in self.tasks.iter().zip(&shares) {
            if count > 0 {
                let sub_params = EpisodeParams {
                    batch_size: count,
                    task_multiplier: 1,
                    ..*params
                };
                episodes.extend(sub.task.sample_batch(rng, &sub_params)?);
            }
        }
        Ok(episodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{ContrastiveTask, MulticlassTask};
    use crate::params::ParamSampler;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(batch_size: usize, n_way: usize) -> EpisodeParams {
        ParamSampler::fixed(batch_size, n_way, 1, 1, 1).sample(&mut ChaCha8Rng::seed_from_u64(0))
    }

    fn classes() -> MulticlassTask {
        MulticlassTask::from_groups((0..6).map(|l| (l, (l * 10..l * 10 + 10).collect())).collect())
    }

    #[test]
    fn test_split_way_fans_out_ways() {
        let task = MultiTaskSplitWay::new(vec![
            WeightedTask::new(ContrastiveTask::new(100), 1.0),
            WeightedTask::new(classes(), 1.0),
        ])
        .unwrap();

        let episode = task
            .sample_episode(&mut ChaCha8Rng::seed_from_u64(4), &params(1, 5))
            .unwrap();
        assert_eq!(episode.n_way(), 5);
        // 3 contrastive ways first, then 2 labeled ways
        assert!(episode.ways[..3].iter().all(|w| w.hops == Some(0) && w.label.is_none()));
        assert!(episode.ways[3..].iter().all(|w| w.label.is_some() && w.hops.is_none()));
    }

    #[test]
    fn test_split_batch_fans_out_episodes() {
        let task: EpisodeTask = MultiTaskSplitBatch::new(vec![
            WeightedTask::new(ContrastiveTask::new(100), 3.0),
            WeightedTask::new(classes(), 1.0),
        ])
        .unwrap()
        .into();

        let episodes = task
            .sample_batch(&mut ChaCha8Rng::seed_from_u64(4), &params(8, 2))
            .unwrap();
        assert_eq!(episodes.len(), 8);
        assert!(episodes[..6].iter().all(|e| e.ways[0].label.is_none()));
        assert!(episodes[6..].iter().all(|e| e.ways[0].label.is_some()));
    }

    #[test]
    fn test_split_batch_single_episode_uses_one_task() {
        let task = MultiTaskSplitBatch::new(vec![
            WeightedTask::new(ContrastiveTask::new(100), 0.0),
            WeightedTask::new(classes(), 1.0),
        ])
        .unwrap();
        let episode = task
            .sample_episode(&mut ChaCha8Rng::seed_from_u64(1), &params(1, 3))
            .unwrap();
        assert!(episode.ways.iter().all(|w| w.label.is_some()));
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(MultiTaskSplitWay::new(Vec::new()).is_err());
        assert!(MultiTaskSplitWay::new(vec![WeightedTask::new(ContrastiveTask::new(5), 0.0)]).is_err());
        assert!(MultiTaskSplitBatch::new(vec![WeightedTask::new(ContrastiveTask::new(5), -1.0)]).is_err());
    }
}
