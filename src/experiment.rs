//! Experiment runner
//!
//! Coordinates the (layer x task x method) loop: extraction, diagnostics,
//! both probe paths, and the append-only results table. A failure inside
//! one (layer, task) cell is logged and skipped; the run continues.

use anyhow::Result;
use tracing::{error, info};

use crate::baseline::random_probe;
use crate::config::RunConfig;
use crate::dataset::{label_counts, Task};
use crate::diagnostics::log_diagnostics;
use crate::extract::extract_activations;
use crate::model::ActivationSource;
use crate::pca::pca_probe;
use crate::results::{Metric, ProbeMethod, ResultsTable};

/// Main experiment runner.
pub struct Experiment<'a, M: ActivationSource> {
    config: &'a RunConfig,
    model: &'a M,
}

impl<'a, M: ActivationSource> Experiment<'a, M> {
    pub fn new(model: &'a M, config: &'a RunConfig) -> Self {
        Self { config, model }
    }

    /// Run the full loop nest and return the accumulated results table.
    pub fn run(&self) -> Result<ResultsTable> {
        let mut table = ResultsTable::new();

        for &layer in &self.config.layers {
            info!("{}", "=".repeat(70));
            info!("LAYER {layer}");
            info!("{}", "=".repeat(70));

            for &task in &self.config.tasks {
                if let Err(err) = self.run_cell(layer, task, &mut table) {
                    error!(
                        "Task '{}' failed at layer {}: {:#}; continuing with next task",
                        task, layer, err
                    );
                }
            }
        }

        self.log_summary(&table);
        Ok(table)
    }

    fn run_cell(&self, layer: usize, task: Task, table: &mut ResultsTable) -> Result<()> {
        let examples = task.dataset();
        info!(
            "Task: {} ({}-class), {} examples, labels {:?}",
            task.title(),
            task.n_classes(),
            examples.len(),
            label_counts(&examples)
        );

        let (activations, labels) =
            extract_activations(self.model, &examples, layer, self.config.hook)?;
        log_diagnostics(&activations, &labels, task.title());

        for &method in &self.config.methods {
            match method {
                ProbeMethod::Pca => {
                    let report = pca_probe(
                        &activations,
                        &labels,
                        self.config.n_components,
                        self.config.n_runs,
                        self.config.seed,
                    )?;
                    table.push_runs(layer, task.name(), method, &report.runs, None);
                }
                ProbeMethod::Random => {
                    let report = random_probe(
                        &activations,
                        &labels,
                        self.config.n_subsets,
                        self.config.size_policy,
                        self.config.seed,
                    )?;
                    table.push_runs(
                        layer,
                        task.name(),
                        method,
                        &report.runs,
                        Some(&report.n_features_used),
                    );
                }
            }
        }

        Ok(())
    }

    /// Per-task, per-layer mean and std of every metric.
    fn log_summary(&self, table: &ResultsTable) {
        info!("{}", "=".repeat(70));
        info!("SUMMARY STATISTICS");
        info!("{}", "=".repeat(70));

        for &task in &self.config.tasks {
            for &method in &self.config.methods {
                let layers = table.layers_for(task.name(), method);
                if layers.is_empty() {
                    continue;
                }
                info!("{} - {}:", task.title(), method.title());
                for layer in layers {
                    let summaries: Vec<String> = Metric::ALL
                        .iter()
                        .map(|&metric| {
                            let values =
                                table.metric_values(layer, task.name(), method, metric);
                            let (mean, std) = crate::results::mean_std(&values);
                            format!("{}={:.4} +/- {:.4}", metric.column(), mean, std)
                        })
                        .collect();
                    info!("  Layer {}: {}", layer, summaries.join(", "));
                }
            }
        }
    }
}
