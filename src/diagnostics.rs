//! Read-only diagnostics over extracted activations
//!
//! Logged before probing as a sanity check; never affects control flow.

use ndarray::{Array1, Array2, Axis};
use tracing::info;

/// Threshold below which a feature's variance counts as zero.
const ZERO_VARIANCE_EPS: f64 = 1e-10;

/// Log activation statistics, label distribution, and (for binary tasks)
/// a between-class / total variance separability ratio.
pub fn log_diagnostics(activations: &Array2<f64>, labels: &Array1<usize>, task_name: &str) {
    info!("  [diagnostics] {}", task_name);
    info!(
        "    activations: {} x {}, labels: {}",
        activations.nrows(),
        activations.ncols(),
        labels.len()
    );

    let mean = activations.mean().unwrap_or(0.0);
    let std = activations.std(0.0);
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in activations.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    info!(
        "    mean: {:.6}, std: {:.6}, min: {:.6}, max: {:.6}",
        mean, std, min, max
    );

    let feature_variance = activations.var_axis(Axis(0), 0.0);
    let zero_variance = feature_variance
        .iter()
        .filter(|&&v| v < ZERO_VARIANCE_EPS)
        .count();
    info!(
        "    dimensions with zero variance: {}/{}",
        zero_variance,
        activations.ncols()
    );

    let counts = label_counts_from_array(labels);
    info!("    label distribution: {:?}", counts);

    if counts.len() == 2 {
        let classes: Vec<usize> = counts.keys().copied().collect();
        let rows_of = |class: usize| -> Vec<usize> {
            labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == class)
                .map(|(i, _)| i)
                .collect()
        };
        let class0 = activations.select(Axis(0), &rows_of(classes[0]));
        let class1 = activations.select(Axis(0), &rows_of(classes[1]));

        let mean_gap = (&class0.mean_axis(Axis(0)).unwrap()
            - &class1.mean_axis(Axis(0)).unwrap())
            .mapv(f64::abs)
            .mean()
            .unwrap_or(0.0);
        info!("    mean activation difference between classes: {:.6}", mean_gap);

        let ratio = separability_ratio(activations, &class0, &class1);
        info!("    separability ratio: {:.6}", ratio);
    }
}

/// Between-class variance over total variance, from the global class means.
fn separability_ratio(all: &Array2<f64>, class0: &Array2<f64>, class1: &Array2<f64>) -> f64 {
    let total_var = all.var(0.0);
    let m0 = class0.mean().unwrap_or(0.0);
    let m1 = class1.mean().unwrap_or(0.0);
    let between_class_var = (m0 - m1).powi(2) / 2.0;
    between_class_var / (total_var + 1e-10)
}

fn label_counts_from_array(labels: &Array1<usize>) -> std::collections::BTreeMap<usize, usize> {
    let mut counts = std::collections::BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separability_ratio_separated_classes() {
        let all = array![[-1.0, -1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, 1.0]];
        let class0 = array![[-1.0, -1.0], [-1.0, -1.0]];
        let class1 = array![[1.0, 1.0], [1.0, 1.0]];

        let ratio = separability_ratio(&all, &class0, &class1);
        // Between-class variance (0-mean classes at +/-1): 4/2 = 2; total 1.
        assert!((ratio - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_separability_ratio_identical_classes() {
        let all = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        let class0 = array![[1.0, 2.0], [1.0, 2.0]];
        let class1 = array![[1.0, 2.0], [1.0, 2.0]];

        let ratio = separability_ratio(&all, &class0, &class1);
        assert!(ratio.abs() < 1e-6);
    }

    #[test]
    fn test_log_diagnostics_does_not_panic() {
        let x = array![[0.0, 1.0], [0.5, 1.0], [1.0, 1.0]];
        let y = array![0, 1, 1];
        log_diagnostics(&x, &y, "smoke");
    }
}
