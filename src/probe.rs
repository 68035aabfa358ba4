//! Linear probing with linfa logistic regression
//!
//! Trains multinomial logistic-regression probes on activation features and
//! scores them with mutual information, accuracy, and macro-averaged F1.
//! Evaluation is in-sample by design: the probe is scored on the matrix it
//! was fitted on, measuring how much of the label is linearly present in
//! the features rather than how well it generalizes.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use linfa::prelude::*;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Metrics from one probe run.
#[derive(Debug, Clone, Copy)]
pub struct ProbeMetrics {
    /// Mutual information between true labels and predictions (nats).
    pub mutual_information: f64,
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Unweighted mean of per-class F1 scores.
    pub f1_macro: f64,
}

/// Trainer for linear probes.
///
/// The optimizer itself is deterministic, so run-to-run variation comes from
/// the seeded random draw of the initial parameter matrix.
pub struct ProbeTrainer {
    max_iterations: u64,
    seed: u64,
}

impl ProbeTrainer {
    pub fn new(seed: u64) -> Self {
        Self {
            max_iterations: 2000,
            seed,
        }
    }

    /// Train a probe on `(x, y)` and evaluate it on the same data.
    pub fn fit_evaluate(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<ProbeMetrics> {
        anyhow::ensure!(x.nrows() == y.len(), "feature/label row mismatch");
        anyhow::ensure!(x.nrows() > 0, "empty dataset");

        let classes: BTreeSet<usize> = y.iter().copied().collect();
        anyhow::ensure!(
            classes.len() >= 2,
            "need at least two classes, got {}",
            classes.len()
        );

        debug!(
            "Training probe: {} samples, {} features, {} classes",
            x.nrows(),
            x.ncols(),
            classes.len()
        );

        let init = self.initial_params(x.ncols(), classes.len());
        let dataset = Dataset::new(x.clone(), y.clone());

        // A non-converged fit within the iteration cap is not an error; it
        // just yields whatever parameters the cap left behind.
        let model = MultiLogisticRegression::default()
            .max_iterations(self.max_iterations)
            .initial_params(init)
            .fit(&dataset)
            .context("Failed to train logistic regression")?;

        let predictions = model.predict(x);

        Ok(ProbeMetrics {
            mutual_information: mutual_information(y, &predictions),
            accuracy: accuracy(y, &predictions),
            f1_macro: macro_f1(y, &predictions),
        })
    }

    /// Seeded Gaussian initial parameters, shape `(n_features + 1, n_classes)`
    /// (the extra row is the intercept).
    fn initial_params(&self, n_features: usize, n_classes: usize) -> Array2<f64> {
        let normal = Normal::new(0.0, 0.01).expect("valid normal parameters");
        let mut rng = StdRng::seed_from_u64(self.seed);
        Array2::from_shape_fn((n_features + 1, n_classes), |_| normal.sample(&mut rng))
    }
}

/// Mutual information (in nats) between two label assignments.
///
/// Computed from the contingency table of `(label, prediction)` pairs:
/// `sum_ij p_ij * ln(p_ij / (p_i * q_j))` over non-empty cells.
pub fn mutual_information(labels: &Array1<usize>, predictions: &Array1<usize>) -> f64 {
    assert_eq!(labels.len(), predictions.len());
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }

    let n_rows = labels.iter().max().copied().unwrap_or(0) + 1;
    let n_cols = predictions.iter().max().copied().unwrap_or(0) + 1;

    let mut joint = Array2::<f64>::zeros((n_rows, n_cols));
    for (&l, &p) in labels.iter().zip(predictions.iter()) {
        joint[[l, p]] += 1.0;
    }
    joint /= n as f64;

    let row_sums = joint.sum_axis(Axis(1));
    let col_sums = joint.sum_axis(Axis(0));

    let mut mi = 0.0;
    for i in 0..n_rows {
        for j in 0..n_cols {
            let p_ij = joint[[i, j]];
            if p_ij > 0.0 {
                mi += p_ij * (p_ij / (row_sums[i] * col_sums[j])).ln();
            }
        }
    }
    mi.max(0.0)
}

/// Fraction of positions where labels and predictions agree.
pub fn accuracy(labels: &Array1<usize>, predictions: &Array1<usize>) -> f64 {
    assert_eq!(labels.len(), predictions.len());
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels
        .iter()
        .zip(predictions.iter())
        .filter(|(l, p)| l == p)
        .count();
    correct as f64 / labels.len() as f64
}

/// Macro-averaged F1 over the classes present in either vector.
///
/// A class with zero precision+recall contributes an F1 of 0.
pub fn macro_f1(labels: &Array1<usize>, predictions: &Array1<usize>) -> f64 {
    assert_eq!(labels.len(), predictions.len());
    let classes: BTreeSet<usize> = labels.iter().chain(predictions.iter()).copied().collect();
    if classes.is_empty() {
        return 0.0;
    }

    let mut f1_sum = 0.0;
    for &class in &classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&l, &p) in labels.iter().zip(predictions.iter()) {
            match (l == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = if tp + fp == 0 {
            0.0
        } else {
            tp as f64 / (tp + fp) as f64
        };
        let recall = if tp + fn_ == 0 {
            0.0
        } else {
            tp as f64 / (tp + fn_) as f64
        };
        if precision + recall > 0.0 {
            f1_sum += 2.0 * precision * recall / (precision + recall);
        }
    }
    f1_sum / classes.len() as f64
}

/// Standardize columns to zero mean and unit variance.
///
/// Statistics are fit on `x` itself (a within-sample transform). Columns
/// with zero variance are left centered but unscaled.
pub fn standardize(x: &Array2<f64>) -> Array2<f64> {
    let mean = x.mean_axis(Axis(0)).expect("non-empty matrix");
    let std = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s < f64::EPSILON { 1.0 } else { s });
    (x - &mean) / &std
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y = array![0, 0, 1, 1];
        let p = array![0, 1, 1, 1];
        assert!((accuracy(&y, &p) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_mutual_information_perfect_predictor() {
        // Perfect balanced binary prediction: MI equals H(y) = ln 2.
        let y = array![0, 0, 1, 1];
        let p = array![0, 0, 1, 1];
        assert!((mutual_information(&y, &p) - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_mutual_information_independent() {
        let y = array![0, 0, 1, 1];
        let p = array![0, 1, 0, 1];
        assert!(mutual_information(&y, &p).abs() < 1e-12);
    }

    #[test]
    fn test_mutual_information_relabeled_predictions() {
        // MI is invariant to swapping the prediction labels.
        let y = array![0, 0, 1, 1];
        let p = array![1, 1, 0, 0];
        assert!((mutual_information(&y, &p) - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_macro_f1_perfect() {
        let y = array![0, 1, 2, 0, 1, 2];
        let p = array![0, 1, 2, 0, 1, 2];
        assert!((macro_f1(&y, &p) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_macro_f1_one_class_missed() {
        // Class 1 never predicted: F1 = (1.0 + 0.0) / 2.
        let y = array![0, 0, 1, 1];
        let p = array![0, 0, 0, 0];
        let f1 = macro_f1(&y, &p);
        // Class 0: precision 0.5, recall 1.0 -> F1 2/3; class 1: F1 0.
        assert!((f1 - (2.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_standardize_columns() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let z = standardize(&x);

        let col0 = z.column(0);
        assert!(col0.mean().unwrap().abs() < 1e-12);
        assert!((col0.std(0.0) - 1.0).abs() < 1e-12);

        // Zero-variance column stays centered at zero, not NaN.
        assert!(z.column(1).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_probe_separable_data() {
        // Two clearly separated clusters along the first feature.
        let x = array![
            [-2.0, 0.1],
            [-1.9, -0.2],
            [-2.1, 0.0],
            [2.0, 0.1],
            [1.9, -0.1],
            [2.1, 0.2]
        ];
        let y = array![0, 0, 0, 1, 1, 1];

        let metrics = ProbeTrainer::new(42).fit_evaluate(&x, &y).unwrap();
        assert!((metrics.accuracy - 1.0).abs() < 1e-12);
        assert!((metrics.f1_macro - 1.0).abs() < 1e-12);
        assert!(metrics.mutual_information > 0.6);
    }

    #[test]
    fn test_probe_rejects_single_class() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 0];
        assert!(ProbeTrainer::new(42).fit_evaluate(&x, &y).is_err());
    }
}
