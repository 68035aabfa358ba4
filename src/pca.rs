//! PCA probe path
//!
//! Standardizes activations, projects them onto a fixed number of principal
//! components, and trains repeated logistic-regression probes on the reduced
//! features. The PCA is fit once; only the probe's seeded initialization
//! varies across runs.

use anyhow::{Context, Result};
use linfa::prelude::*;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2};
use tracing::{info, warn};

use crate::probe::{standardize, ProbeMetrics, ProbeTrainer};

/// Output of the PCA probe for one (layer, task) cell.
#[derive(Debug, Clone)]
pub struct PcaProbeReport {
    /// Fraction of total variance explained by each retained component.
    pub explained_variance_ratio: Vec<f64>,
    /// Running sum of the ratios; non-decreasing, bounded by 1.
    pub cumulative_variance: Vec<f64>,
    /// Per-run metrics, one entry per repetition.
    pub runs: Vec<ProbeMetrics>,
}

/// Standardize, reduce to `n_components` principal components, and train
/// `n_runs` probes on the reduced matrix.
pub fn pca_probe(
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_components: usize,
    n_runs: usize,
    seed: u64,
) -> Result<PcaProbeReport> {
    anyhow::ensure!(n_components > 0, "n_components must be positive");
    anyhow::ensure!(n_runs > 0, "n_runs must be positive");
    anyhow::ensure!(x.nrows() == y.len(), "feature/label row mismatch");
    anyhow::ensure!(x.nrows() > 0, "empty activation matrix");

    let standardized = standardize(x);

    // PCA cannot retain more components than min(n_samples, n_features).
    let max_components = standardized.nrows().min(standardized.ncols());
    let n_components = if n_components > max_components {
        warn!(
            "Requested {} components but only {} are available; clamping",
            n_components, max_components
        );
        max_components
    } else {
        n_components
    };

    let dataset = DatasetBase::from(standardized.clone());
    let pca = Pca::params(n_components)
        .fit(&dataset)
        .context("PCA fit failed")?;
    let reduced: Array2<f64> = pca.predict(&standardized);

    let explained_variance_ratio: Vec<f64> = pca.explained_variance_ratio().to_vec();
    let cumulative_variance: Vec<f64> = explained_variance_ratio
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect();

    info!(
        "  PCA explained variance (top {} components): {:.4} cumulative",
        n_components,
        cumulative_variance.last().copied().unwrap_or(0.0)
    );

    let mut runs = Vec::with_capacity(n_runs);
    for run in 0..n_runs {
        let trainer = ProbeTrainer::new(seed + run as u64);
        runs.push(trainer.fit_evaluate(&reduced, y)?);
    }

    Ok(PcaProbeReport {
        explained_variance_ratio,
        cumulative_variance,
        runs,
    })
}
