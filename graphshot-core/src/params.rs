//! Per-batch structural parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GraphshotError, Result};

/// A fixed value or an inclusive `[min, max]` range.
///
/// Deserializes from either a number or a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRange {
    Fixed(usize),
    Range(usize, usize),
}

impl ParamRange {
    pub fn min(&self) -> usize {
        match *self {
            ParamRange::Fixed(v) => v,
            ParamRange::Range(lo, _) => lo,
        }
    }

    pub fn max(&self) -> usize {
        match *self {
            ParamRange::Fixed(v) => v,
            ParamRange::Range(_, hi) => hi,
        }
    }

    /// Draw a value. Fixed values consume no randomness.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match *self {
            ParamRange::Fixed(v) => v,
            ParamRange::Range(lo, hi) => rng.gen_range(lo..=hi),
        }
    }

    fn validate(&self, name: &str, floor: usize) -> Result<()> {
        if self.min() > self.max() {
            return Err(GraphshotError::config(format!(
                "{} range [{}, {}] is empty",
                name,
                self.min(),
                self.max()
            )));
        }
        if self.min() < floor {
            return Err(GraphshotError::config(format!(
                "{} must be at least {}, got {}",
                name,
                floor,
                self.min()
            )));
        }
        Ok(())
    }
}

impl From<usize> for ParamRange {
    fn from(v: usize) -> Self {
        ParamRange::Fixed(v)
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRange::Fixed(v) => write!(f, "{}", v),
            ParamRange::Range(lo, hi) => write!(f, "{}..={}", lo, hi),
        }
    }
}

/// Concrete parameters of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeParams {
    pub batch_size: usize,
    pub n_way: usize,
    pub n_shot: usize,
    pub n_query: usize,
    pub task_multiplier: usize,
}

impl EpisodeParams {
    /// Episodes drawn for one batch.
    pub fn episodes_per_batch(&self) -> usize {
        self.batch_size * self.task_multiplier
    }

    /// Nodes a single way contributes (support plus query).
    pub fn nodes_per_way(&self) -> usize {
        self.n_shot + self.n_query
    }

    pub fn with_way(self, n_way: usize) -> Self {
        Self { n_way, ..self }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }
}

/// Draws [`EpisodeParams`] from fixed values or ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSampler {
    pub batch_size: ParamRange,
    pub n_way: ParamRange,
    pub n_shot: ParamRange,
    pub n_query: ParamRange,
    pub task_multiplier: ParamRange,
}

impl ParamSampler {
    /// A sampler that always returns the same parameters.
    pub fn fixed(
        batch_size: usize,
        n_way: usize,
        n_shot: usize,
        n_query: usize,
        task_multiplier: usize,
    ) -> Self {
        Self {
            batch_size: batch_size.into(),
            n_way: n_way.into(),
            n_shot: n_shot.into(),
            n_query: n_query.into(),
            task_multiplier: task_multiplier.into(),
        }
    }

    /// Reject empty ranges and zero sizes (`n_query` may be zero).
    pub fn validate(&self) -> Result<()> {
        self.batch_size.validate("batch_size", 1)?;
        self.n_way.validate("n_way", 1)?;
        self.n_shot.validate("n_shot", 1)?;
        self.n_query.validate("n_query", 0)?;
        self.task_multiplier.validate("task_multiplier", 1)
    }

    /// Draw parameters in a fixed field order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> EpisodeParams {
        EpisodeParams {
            batch_size: self.batch_size.sample(rng),
            n_way: self.n_way.sample(rng),
            n_shot: self.n_shot.sample(rng),
            n_query: self.n_query.sample(rng),
            task_multiplier: self.task_multiplier.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fixed_params() {
        let sampler = ParamSampler::fixed(5, 3, 3, 24, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let params = sampler.sample(&mut rng);
        assert_eq!(params.n_way, 3);
        assert_eq!(params.n_query, 24);
        assert_eq!(params.episodes_per_batch(), 5);
        assert_eq!(params.nodes_per_way(), 27);
    }

    #[test]
    fn test_ranges_are_reproducible_and_bounded() {
        let sampler = ParamSampler {
            n_way: ParamRange::Range(2, 10),
            ..ParamSampler::fixed(4, 1, 1, 1, 2)
        };
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..20).map(|_| sampler.sample(&mut rng)).collect::<Vec<_>>()
        };
        let a = draw(9);
        assert_eq!(a, draw(9));
        assert!(a.iter().all(|p| (2..=10).contains(&p.n_way)));
        assert_eq!(a[0].episodes_per_batch(), 8);
    }

    #[test]
    fn test_validate() {
        assert!(ParamSampler::fixed(1, 1, 1, 0, 1).validate().is_ok());
        assert!(ParamSampler::fixed(0, 1, 1, 1, 1).validate().is_err());
        let empty = ParamSampler {
            n_shot: ParamRange::Range(5, 2),
            ..ParamSampler::fixed(1, 1, 1, 1, 1)
        };
        assert!(matches!(empty.validate(), Err(GraphshotError::Config { .. })));
    }

    #[test]
    fn test_param_range_display() {
        assert_eq!(ParamRange::Fixed(3).to_string(), "3");
        assert_eq!(ParamRange::Range(1, 4).to_string(), "1..=4");
    }
}
