//! Results table and CSV persistence

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeMetrics;

/// Probe method that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    Pca,
    Random,
}

impl ProbeMethod {
    pub fn name(self) -> &'static str {
        match self {
            ProbeMethod::Pca => "pca",
            ProbeMethod::Random => "random",
        }
    }

    /// Label used in plot captions.
    pub fn title(self) -> &'static str {
        match self {
            ProbeMethod::Pca => "PCA",
            ProbeMethod::Random => "Random Baseline",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProbeMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pca" => Ok(ProbeMethod::Pca),
            "random" => Ok(ProbeMethod::Random),
            other => anyhow::bail!("unknown probe method '{other}'"),
        }
    }
}

/// Metric columns of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MutualInformation,
    Accuracy,
    F1Score,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::MutualInformation, Metric::Accuracy, Metric::F1Score];

    pub fn column(self) -> &'static str {
        match self {
            Metric::MutualInformation => "mutual_information",
            Metric::Accuracy => "accuracy",
            Metric::F1Score => "f1_score",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::MutualInformation => "Mutual Information",
            Metric::Accuracy => "Accuracy",
            Metric::F1Score => "F1 Score",
        }
    }

    pub fn of(self, record: &ResultRecord) -> f64 {
        match self {
            Metric::MutualInformation => record.mutual_information,
            Metric::Accuracy => record.accuracy,
            Metric::F1Score => record.f1_score,
        }
    }
}

/// One row of the persisted results table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub layer: usize,
    pub task: String,
    pub method: ProbeMethod,
    pub run: usize,
    pub mutual_information: f64,
    pub accuracy: f64,
    pub f1_score: f64,
    pub n_features_used: Option<usize>,
}

/// Append-only collection of result records for a full run.
#[derive(Debug, Default)]
pub struct ResultsTable {
    records: Vec<ResultRecord>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Append one record per run of a probe report.
    pub fn push_runs(
        &mut self,
        layer: usize,
        task: &str,
        method: ProbeMethod,
        runs: &[ProbeMetrics],
        n_features_used: Option<&[usize]>,
    ) {
        for (run, metrics) in runs.iter().enumerate() {
            self.push(ResultRecord {
                layer,
                task: task.to_string(),
                method,
                run,
                mutual_information: metrics.mutual_information,
                accuracy: metrics.accuracy,
                f1_score: metrics.f1_macro,
                n_features_used: n_features_used.map(|sizes| sizes[run]),
            });
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct layers present for a (task, method) pair.
    pub fn layers_for(&self, task: &str, method: ProbeMethod) -> Vec<usize> {
        let mut layers: Vec<usize> = self
            .records
            .iter()
            .filter(|r| r.task == task && r.method == method)
            .map(|r| r.layer)
            .collect();
        layers.sort_unstable();
        layers.dedup();
        layers
    }

    /// Metric values for one (layer, task, method) cell, in run order.
    pub fn metric_values(
        &self,
        layer: usize,
        task: &str,
        method: ProbeMethod,
        metric: Metric,
    ) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.layer == layer && r.task == task && r.method == method)
            .map(|r| metric.of(r))
            .collect()
    }

    /// Write the table as CSV with the canonical column order.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Mean and sample standard deviation of a value list.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(accuracy: f64) -> ProbeMetrics {
        ProbeMetrics {
            mutual_information: 0.5,
            accuracy,
            f1_macro: accuracy,
        }
    }

    #[test]
    fn test_push_runs_contiguous_indices() {
        let mut table = ResultsTable::new();
        table.push_runs(
            3,
            "pos",
            ProbeMethod::Random,
            &[metrics(0.8), metrics(0.9), metrics(0.7)],
            Some(&[38, 38, 38]),
        );

        let runs: Vec<usize> = table.records().iter().map(|r| r.run).collect();
        assert_eq!(runs, vec![0, 1, 2]);
        assert!(table
            .records()
            .iter()
            .all(|r| r.n_features_used == Some(38)));
    }

    #[test]
    fn test_metric_values_filtering() {
        let mut table = ResultsTable::new();
        table.push_runs(1, "pos", ProbeMethod::Pca, &[metrics(0.5)], None);
        table.push_runs(2, "pos", ProbeMethod::Pca, &[metrics(0.9)], None);
        table.push_runs(2, "ner", ProbeMethod::Pca, &[metrics(0.1)], None);

        let values = table.metric_values(2, "pos", ProbeMethod::Pca, Metric::Accuracy);
        assert_eq!(values, vec![0.9]);
        assert_eq!(table.layers_for("pos", ProbeMethod::Pca), vec![1, 2]);
    }

    #[test]
    fn test_csv_column_order() {
        let mut table = ResultsTable::new();
        table.push_runs(1, "ner", ProbeMethod::Pca, &[metrics(1.0)], None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw_results.csv");
        table.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "layer,task,method,run,mutual_information,accuracy,f1_score,n_features_used"
        );
        // PCA rows leave n_features_used empty.
        assert!(contents.lines().nth(1).unwrap().ends_with(','));
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[1.0, 2.0, 3.0]);
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);

        let (mean, std) = mean_std(&[5.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!(std.abs() < 1e-12);
    }
}
