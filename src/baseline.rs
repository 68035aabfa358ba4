//! Random-subset baseline probe
//!
//! Null comparator for the PCA path: instead of principal components, each
//! trial trains a probe on a randomly drawn subset of the raw standardized
//! features. If PCA's components are genuinely informative they should beat
//! arbitrary feature selections of comparable cardinality.

use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};

use crate::probe::{standardize, ProbeMetrics, ProbeTrainer};

/// Bounded attempts at drawing a subset not seen earlier in the same run.
const MAX_UNIQUE_ATTEMPTS: usize = 1000;

/// How each trial picks its subset size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizePolicy {
    /// Fixed size `d_model / ratio`.
    Fixed { ratio: usize },
    /// Uniformly sampled integer in `[1, d_model]`.
    Uniform,
    /// Gaussian-sampled around `mean` (default `d_model / 20`) with the
    /// given `std` (default 5), clamped to `[10, d_model]`.
    Gaussian {
        mean: Option<usize>,
        std: Option<f64>,
    },
}

impl SizePolicy {
    /// Draw a subset size for a feature space of width `d`.
    ///
    /// All results are clamped to `[1, d]` so a policy can never demand
    /// more features than exist.
    fn sample_size(&self, d: usize, rng: &mut StdRng) -> usize {
        let size = match *self {
            SizePolicy::Fixed { ratio } => d / ratio.max(1),
            SizePolicy::Uniform => rng.gen_range(1..=d),
            SizePolicy::Gaussian { mean, std } => {
                let mean = mean.unwrap_or(d / 20) as f64;
                let std = std.unwrap_or(5.0);
                let normal = Normal::new(mean, std).expect("valid normal parameters");
                let sample = normal.sample(rng).round();
                let lower = 10.min(d);
                (sample.max(lower as f64) as usize).min(d)
            }
        };
        size.clamp(1, d)
    }

    /// Description used in log lines and plot captions.
    pub fn describe(&self, d: usize) -> String {
        match *self {
            SizePolicy::Fixed { ratio } => format!("fixed size = d_model/{ratio}"),
            SizePolicy::Uniform => format!("uniform size from [1, {d}]"),
            SizePolicy::Gaussian { mean, std } => format!(
                "Gaussian ~ N({}, {})",
                mean.unwrap_or(d / 20),
                std.unwrap_or(5.0)
            ),
        }
    }
}

impl fmt::Display for SizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizePolicy::Fixed { .. } => f.write_str("fixed"),
            SizePolicy::Uniform => f.write_str("uniform"),
            SizePolicy::Gaussian { .. } => f.write_str("gaussian"),
        }
    }
}

/// Output of the random-subset baseline for one (layer, task) cell.
#[derive(Debug, Clone)]
pub struct RandomProbeReport {
    /// Per-trial metrics, one entry per subset.
    pub runs: Vec<ProbeMetrics>,
    /// Realized subset size per trial.
    pub n_features_used: Vec<usize>,
}

/// Train one probe per random feature subset, evaluating in-sample exactly
/// like the PCA path.
///
/// Trial `s` is seeded with `seed + s`, so identical inputs reproduce
/// identical subsets and metrics.
pub fn random_probe(
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_subsets: usize,
    policy: SizePolicy,
    seed: u64,
) -> Result<RandomProbeReport> {
    anyhow::ensure!(n_subsets > 0, "n_subsets must be positive");
    anyhow::ensure!(x.nrows() == y.len(), "feature/label row mismatch");
    anyhow::ensure!(x.nrows() > 0, "empty activation matrix");

    let standardized = standardize(x);
    let d = standardized.ncols();

    let mut runs = Vec::with_capacity(n_subsets);
    let mut n_features_used = Vec::with_capacity(n_subsets);
    let mut used_subsets: HashSet<Vec<usize>> = HashSet::new();

    for subset_idx in 0..n_subsets {
        let mut rng = StdRng::seed_from_u64(seed + subset_idx as u64);
        let size = policy.sample_size(d, &mut rng);
        n_features_used.push(size);

        // Avoid exact duplicate subsets across trials; a duplicate is
        // accepted once the attempt budget runs out.
        let mut selected = rand::seq::index::sample(&mut rng, d, size).into_vec();
        let mut attempts = 1;
        loop {
            let mut key = selected.clone();
            key.sort_unstable();
            if used_subsets.insert(key) {
                break;
            }
            if attempts >= MAX_UNIQUE_ATTEMPTS {
                warn!(
                    "Could not find unique subset after {} attempts for subset {}",
                    MAX_UNIQUE_ATTEMPTS, subset_idx
                );
                break;
            }
            selected = rand::seq::index::sample(&mut rng, d, size).into_vec();
            attempts += 1;
        }

        let subset_features = standardized.select(Axis(1), &selected);
        let trainer = ProbeTrainer::new(seed + subset_idx as u64);
        runs.push(trainer.fit_evaluate(&subset_features, y)?);
    }

    info!(
        "  Random baseline ({} subsets, {}): feature counts min={} max={}",
        n_subsets,
        policy.describe(d),
        n_features_used.iter().min().unwrap(),
        n_features_used.iter().max().unwrap()
    );

    Ok(RandomProbeReport {
        runs,
        n_features_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn synthetic(n: usize, d: usize) -> (Array2<f64>, Array1<usize>) {
        // Deterministic features with the label encoded in column 0.
        let x = Array2::from_shape_fn((n, d), |(i, j)| {
            if j == 0 {
                if i < n / 2 {
                    -1.0
                } else {
                    1.0
                }
            } else {
                ((i * 31 + j * 17) % 13) as f64 / 13.0
            }
        });
        let y = Array1::from_shape_fn(n, |i| usize::from(i >= n / 2));
        (x, y)
    }

    #[test]
    fn test_fixed_policy_exact_size() {
        let mut rng = StdRng::seed_from_u64(0);
        let policy = SizePolicy::Fixed { ratio: 20 };
        assert_eq!(policy.sample_size(768, &mut rng), 38);
    }

    #[test]
    fn test_fixed_policy_clamps_small_d() {
        let mut rng = StdRng::seed_from_u64(0);
        let policy = SizePolicy::Fixed { ratio: 20 };
        // 8 / 20 == 0, clamped up to 1.
        assert_eq!(policy.sample_size(8, &mut rng), 1);
    }

    #[test]
    fn test_uniform_policy_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = SizePolicy::Uniform;
        for _ in 0..100 {
            let size = policy.sample_size(30, &mut rng);
            assert!((1..=30).contains(&size));
        }
    }

    #[test]
    fn test_gaussian_policy_bounds() {
        let mut rng = StdRng::seed_from_u64(2);
        let policy = SizePolicy::Gaussian {
            mean: None,
            std: None,
        };
        for _ in 0..100 {
            let size = policy.sample_size(768, &mut rng);
            assert!((10..=768).contains(&size));
        }
        // Tiny feature space: the lower clamp shrinks to d.
        for _ in 0..20 {
            let size = policy.sample_size(4, &mut rng);
            assert!((1..=4).contains(&size));
        }
    }

    #[test]
    fn test_random_probe_fixed_size_counts() {
        let (x, y) = synthetic(20, 60);
        let report = random_probe(&x, &y, 3, SizePolicy::Fixed { ratio: 20 }, 42).unwrap();

        assert_eq!(report.runs.len(), 3);
        assert_eq!(report.n_features_used, vec![3, 3, 3]);
    }

    #[test]
    fn test_random_probe_reproducible() {
        let (x, y) = synthetic(16, 40);
        let a = random_probe(&x, &y, 3, SizePolicy::Uniform, 42).unwrap();
        let b = random_probe(&x, &y, 3, SizePolicy::Uniform, 42).unwrap();

        assert_eq!(a.n_features_used, b.n_features_used);
        for (ra, rb) in a.runs.iter().zip(b.runs.iter()) {
            assert_eq!(ra.accuracy, rb.accuracy);
            assert_eq!(ra.mutual_information, rb.mutual_information);
            assert_eq!(ra.f1_macro, rb.f1_macro);
        }
    }

    #[test]
    fn test_duplicate_subsets_accepted_when_forced() {
        // d=1 means every subset is {0}; the attempt budget must not fail.
        let (x, y) = synthetic(10, 1);
        let report = random_probe(&x, &y, 3, SizePolicy::Uniform, 42).unwrap();
        assert_eq!(report.runs.len(), 3);
        assert!(report.n_features_used.iter().all(|&n| n == 1));
    }
}
