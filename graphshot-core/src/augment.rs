//! Named feature augmentation policies.
//!
//! A policy name is a comma-separated list of operations applied in order:
//!
//! ```text
//! drop_feature:P   zero each feature column with probability P (same columns for every node)
//! dropout:P        zero each feature entry with probability P
//! noise:S          add Gaussian noise with std S times the column's reference std
//! ```
//!
//! The empty string and `none` are the identity. Randomness comes from the
//! caller's RNG, so a batch's augmentation is reproducible from its seed.

use candle_core::{DType, Tensor};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt;

use crate::error::{GraphshotError, Result};

/// Rows of the reference matrix used to estimate column spread.
const REFERENCE_ROWS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum AugOp {
    DropFeature(f32),
    Dropout(f32),
    Noise(f32),
}

impl fmt::Display for AugOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AugOp::DropFeature(p) => write!(f, "drop_feature:{}", p),
            AugOp::Dropout(p) => write!(f, "dropout:{}", p),
            AugOp::Noise(s) => write!(f, "noise:{}", s),
        }
    }
}

/// A parsed augmentation policy.
#[derive(Debug, Clone, Default)]
pub struct Augmentation {
    ops: Vec<AugOp>,
    /// Per-column std of the reference features, used to scale noise.
    column_std: Option<Vec<f32>>,
}

/// Look up the augmentation policy `name`.
///
/// `reference` is a feature matrix whose column spread scales `noise`;
/// without it noise std is absolute.
///
/// # Errors
///
/// Returns `UnknownAugmentation` for unrecognized operations or bad parameters.
pub fn get_aug(name: &str, reference: Option<&Tensor>) -> Result<Augmentation> {
    let mut ops = Vec::new();
    for part in name.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part == "none" {
            continue;
        }
        let unknown = || GraphshotError::UnknownAugmentation(part.to_string());
        let (op, arg) = part.split_once(':').ok_or_else(unknown)?;
        let value: f32 = arg.trim().parse().map_err(|_| unknown())?;
        let op = match op.trim() {
            "drop_feature" if (0.0..=1.0).contains(&value) => AugOp::DropFeature(value),
            "dropout" if (0.0..=1.0).contains(&value) => AugOp::Dropout(value),
            "noise" if value >= 0.0 && value.is_finite() => AugOp::Noise(value),
            _ => return Err(unknown()),
        };
        ops.push(op);
    }

    let needs_spread = ops.iter().any(|op| matches!(op, AugOp::Noise(_)));
    let column_std = match reference {
        Some(reference) if needs_spread => Some(column_std(reference)?),
        _ => None,
    };
    Ok(Augmentation { ops, column_std })
}

fn column_std(reference: &Tensor) -> Result<Vec<f32>> {
    let rows = reference.dim(0)?.min(REFERENCE_ROWS);
    if rows == 0 {
        return Ok(vec![1.0; reference.dim(1)?]);
    }
    let sample = reference.narrow(0, 0, rows)?.to_dtype(DType::F32)?;
    let mean = sample.mean_keepdim(0)?;
    let var = sample.broadcast_sub(&mean)?.sqr()?.mean(0)?;
    Ok(var.sqrt()?.to_vec1::<f32>()?)
}

impl Augmentation {
    /// The identity policy.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply the policy to an `[n, dim]` f32 feature matrix.
    pub fn apply<R: Rng + ?Sized>(&self, x: &Tensor, rng: &mut R) -> Result<Tensor> {
        if self.is_identity() {
            return Ok(x.clone());
        }
        let (n, dim) = x.dims2()?;
        let device = x.device();
        let mut out = x.clone();

        for op in &self.ops {
            out = match *op {
                AugOp::DropFeature(p) => {
                    let mask: Vec<f32> = (0..dim).map(|_| keep(rng, p)).collect();
                    out.broadcast_mul(&Tensor::from_vec(mask, (1, dim), device)?)?
                }
                AugOp::Dropout(p) => {
                    let mask: Vec<f32> = (0..n * dim).map(|_| keep(rng, p)).collect();
                    out.mul(&Tensor::from_vec(mask, (n, dim), device)?)?
                }
                AugOp::Noise(std) => {
                    let normal = Normal::new(0.0f32, 1.0)
                        .map_err(|e| GraphshotError::UnknownAugmentation(e.to_string()))?;
                    let noise: Vec<f32> = (0..n * dim).map(|_| normal.sample(rng)).collect();
                    let scale: Vec<f32> = match &self.column_std {
                        Some(col) if col.len() == dim => col.iter().map(|s| s * std).collect(),
                        _ => vec![std; dim],
                    };
                    let noise = Tensor::from_vec(noise, (n, dim), device)?
                        .broadcast_mul(&Tensor::from_vec(scale, (1, dim), device)?)?;
                    out.add(&noise)?
                }
            };
        }
        Ok(out)
    }
}

fn keep<R: Rng + ?Sized>(rng: &mut R, p: f32) -> f32 {
    if rng.gen::<f32>() < p {
        0.0
    } else {
        1.0
    }
}

impl fmt::Display for Augmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<String> = self.ops.iter().map(|op| op.to_string()).collect();
        f.write_str(&names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ones(n: usize, dim: usize) -> Tensor {
        Tensor::ones((n, dim), DType::F32, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_identity_names() {
        assert!(get_aug("", None).unwrap().is_identity());
        assert!(get_aug("none", None).unwrap().is_identity());
        let x = ones(2, 3);
        let y = get_aug("", None)
            .unwrap()
            .apply(&x, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();
        assert_eq!(y.to_vec2::<f32>().unwrap(), x.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_unknown_names() {
        for name in ["mixup:0.2", "dropout", "dropout:1.5", "noise:abc"] {
            assert!(
                matches!(get_aug(name, None), Err(GraphshotError::UnknownAugmentation(_))),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_drop_feature_zeroes_whole_columns() {
        let aug = get_aug("drop_feature:0.5", None).unwrap();
        let out = aug
            .apply(&ones(4, 16), &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        for col in 0..16 {
            let column: Vec<f32> = out.iter().map(|row| row[col]).collect();
            assert!(column.iter().all(|&v| v == column[0]));
        }
    }

    #[test]
    fn test_noise_is_reproducible_and_scaled() {
        let reference = Tensor::from_vec(vec![0.0f32, 0.0, 2.0, 0.0], (2, 2), &Device::Cpu).unwrap();
        let aug = get_aug("noise:1.0", Some(&reference)).unwrap();
        let x = ones(3, 2);

        let a = aug.apply(&x, &mut ChaCha8Rng::seed_from_u64(9)).unwrap().to_vec2::<f32>().unwrap();
        let b = aug.apply(&x, &mut ChaCha8Rng::seed_from_u64(9)).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
        // Column 1 has zero spread in the reference, so it is untouched
        assert!(a.iter().all(|row| row[1] == 1.0));
        assert!(a.iter().any(|row| row[0] != 1.0));
    }

    #[test]
    fn test_display_round_trip() {
        let aug = get_aug("dropout:0.1, noise:0.5", None).unwrap();
        assert_eq!(aug.to_string(), "dropout:0.1,noise:0.5");
        assert_eq!(Augmentation::identity().to_string(), "none");
    }
}
