//! Bar charts of per-layer probe metrics
//!
//! One bar per layer showing the mean over runs, with a Student-t
//! confidence-interval error bar.

use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::info;

use crate::results::{Metric, ProbeMethod, ResultsTable};

/// Half-width of the confidence interval for a sample at the given level.
///
/// Uses the two-sided Student-t critical value with `n - 1` degrees of
/// freedom; zero when fewer than two values exist.
pub fn confidence_half_width(values: &[f64], level: f64) -> Result<f64> {
    anyhow::ensure!(
        level > 0.0 && level < 1.0,
        "confidence level must be in (0, 1), got {level}"
    );
    if values.len() < 2 {
        return Ok(0.0);
    }
    let (_, std) = crate::results::mean_std(values);
    let n = values.len() as f64;
    let sem = std / n.sqrt();
    let df = n - 1.0;
    let t = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| anyhow::anyhow!("StudentsT({df}): {e}"))?
        .inverse_cdf(0.5 + level / 2.0);
    Ok(t * sem)
}

/// Render a bar chart for one (task, method, metric) combination.
///
/// X axis: layer index; bar height: mean metric over runs at that layer;
/// error bar: `level` confidence interval.
pub fn create_bar_plot(
    table: &ResultsTable,
    task: &str,
    task_title: &str,
    method: ProbeMethod,
    metric: Metric,
    level: f64,
    output_path: &Path,
) -> Result<()> {
    let layers = table.layers_for(task, method);
    anyhow::ensure!(!layers.is_empty(), "no records for task '{task}'");

    let mut means = Vec::with_capacity(layers.len());
    let mut half_widths = Vec::with_capacity(layers.len());
    for &layer in &layers {
        let values = table.metric_values(layer, task, method, metric);
        let (mean, _) = crate::results::mean_std(&values);
        means.push(mean);
        half_widths.push(confidence_half_width(&values, level)?);
    }

    let y_max = means
        .iter()
        .zip(half_widths.iter())
        .map(|(m, c)| m + c)
        .fold(0.0f64, f64::max)
        .max(1e-6)
        * 1.15;
    let x_min = *layers.first().unwrap() as f64 - 0.7;
    let x_max = *layers.last().unwrap() as f64 + 0.7;

    let root = BitMapBackend::new(output_path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let title = format!(
        "{} ({}): {} Across Layers",
        task_title,
        method.title(),
        metric.label()
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Layer")
        .y_desc(metric.label())
        .x_labels(layers.len())
        .x_label_formatter(&|x| format!("{}", x.round() as i64))
        .disable_x_mesh()
        .draw()?;

    chart.draw_series(layers.iter().zip(means.iter()).map(|(&layer, &mean)| {
        Rectangle::new(
            [(layer as f64 - 0.35, 0.0), (layer as f64 + 0.35, mean)],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    chart.draw_series(layers.iter().zip(means.iter().zip(half_widths.iter())).map(
        |(&layer, (&mean, &half))| {
            ErrorBar::new_vertical(
                layer as f64,
                mean - half,
                mean,
                mean + half,
                BLACK.filled(),
                10,
            )
        },
    ))?;

    root.present()?;
    info!("  Saved: {}", output_path.display());
    Ok(())
}

/// Render the full plot set: every (task, method) pair crossed with every
/// metric column.
pub fn render_all(
    table: &ResultsTable,
    tasks: &[(String, String)],
    methods: &[ProbeMethod],
    level: f64,
    plots_dir: &Path,
) -> Result<usize> {
    std::fs::create_dir_all(plots_dir)
        .with_context(|| format!("Failed to create {}", plots_dir.display()))?;

    let mut rendered = 0;
    for (task, task_title) in tasks {
        for &method in methods {
            if table.layers_for(task, method).is_empty() {
                continue;
            }
            for metric in Metric::ALL {
                let filename = format!("{}_{}_{}.png", task, method.name(), metric.column());
                create_bar_plot(
                    table,
                    task,
                    task_title,
                    method,
                    metric,
                    level,
                    &plots_dir.join(filename),
                )?;
                rendered += 1;
            }
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeMetrics;

    #[test]
    fn test_confidence_half_width_matches_t_table() {
        // n=3, df=2, 95%: t = 4.3027; values 1,2,3 -> sem = 1/sqrt(3).
        let half = confidence_half_width(&[1.0, 2.0, 3.0], 0.95).unwrap();
        let expected = 4.302652729911275 * (1.0 / 3.0f64.sqrt());
        assert!((half - expected).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_half_width_single_value() {
        let half = confidence_half_width(&[0.5], 0.95).unwrap();
        assert_eq!(half, 0.0);
    }

    #[test]
    fn test_confidence_level_validation() {
        assert!(confidence_half_width(&[1.0, 2.0], 1.5).is_err());
        assert!(confidence_half_width(&[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_narrower_interval_at_lower_level() {
        let values = [0.2, 0.4, 0.6, 0.5];
        let wide = confidence_half_width(&values, 0.95).unwrap();
        let narrow = confidence_half_width(&values, 0.65).unwrap();
        assert!(narrow < wide);
    }

    #[test]
    fn test_create_bar_plot_writes_file() {
        let mut table = ResultsTable::new();
        for layer in 1..=3 {
            table.push_runs(
                layer,
                "pos",
                ProbeMethod::Random,
                &[
                    ProbeMetrics {
                        mutual_information: 0.3,
                        accuracy: 0.7 + layer as f64 * 0.05,
                        f1_macro: 0.6,
                    },
                    ProbeMetrics {
                        mutual_information: 0.4,
                        accuracy: 0.75 + layer as f64 * 0.05,
                        f1_macro: 0.65,
                    },
                ],
                Some(&[38, 38]),
            );
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos_random_accuracy.png");
        create_bar_plot(
            &table,
            "pos",
            "Part of Speech",
            ProbeMethod::Random,
            Metric::Accuracy,
            0.95,
            &path,
        )
        .unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
