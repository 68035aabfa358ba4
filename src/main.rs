//! linprobe-rs CLI: linguistic linear probing across transformer layers

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use linprobe_rs::config::{CliOverrides, RunConfig};
use linprobe_rs::experiment::Experiment;
use linprobe_rs::model::ProbeModel;
use linprobe_rs::plot;

#[derive(Parser)]
#[command(name = "linprobe-rs")]
#[command(about = "Linear probing of per-layer transformer activations")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file (file values override built-in defaults;
    /// explicit flags override the file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model ID from `HuggingFace` (default: gpt2)
    #[arg(short, long)]
    model: Option<String>,

    /// Hook point to read: resid_pre or resid_post (default: resid_post)
    #[arg(long)]
    hook: Option<String>,

    /// Layers to probe: "1-11", "1,5,10", or "3" (default: 1-11)
    #[arg(short, long)]
    layers: Option<String>,

    /// Output directory for results (default: outputs/linear_probe)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of PCA components (default: 10)
    #[arg(long)]
    n_components: Option<usize>,

    /// Number of probe training runs (default: 3)
    #[arg(long)]
    n_runs: Option<usize>,

    /// Base random seed (default: 42)
    #[arg(long)]
    seed: Option<u64>,

    /// Comma-separated tasks (default: pos,ner,word_length,sentiment,verb_tense)
    #[arg(short, long)]
    tasks: Option<String>,

    /// Comma-separated probe methods: pca, random (default: both)
    #[arg(long)]
    methods: Option<String>,

    /// Number of random baseline subsets (default: 3)
    #[arg(long)]
    n_subsets: Option<usize>,

    /// Subset size policy: fixed, uniform, or gaussian (default: gaussian)
    #[arg(long)]
    subset_size_policy: Option<String>,

    /// Ratio for the fixed policy: size = d_model / ratio (default: 20)
    #[arg(long)]
    fixed_size_ratio: Option<usize>,

    /// Mean for the gaussian policy (default: d_model / 20)
    #[arg(long)]
    subset_mean: Option<usize>,

    /// Standard deviation for the gaussian policy (default: 5)
    #[arg(long)]
    subset_std: Option<f64>,

    /// Confidence level for plot error bars (default: 0.95)
    #[arg(long)]
    ci_level: Option<f64>,

    /// Force CPU mode (slower but avoids CUDA issues)
    #[arg(long)]
    cpu: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config: self.config.clone(),
            model: self.model.clone(),
            hook: self.hook.clone(),
            layers: self.layers.clone(),
            output: self.output.clone(),
            n_components: self.n_components,
            n_runs: self.n_runs,
            seed: self.seed,
            tasks: self.tasks.clone(),
            methods: self.methods.clone(),
            n_subsets: self.n_subsets,
            subset_size_policy: self.subset_size_policy.clone(),
            fixed_size_ratio: self.fixed_size_ratio,
            subset_mean: self.subset_mean,
            subset_std: self.subset_std,
            ci_level: self.ci_level,
            force_cpu: self.cpu,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration failures abort before any extraction begins.
    let config = RunConfig::resolve(&cli.overrides())?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    // Console plus a file log in the output directory; the guard flushes
    // the file writer when the run ends.
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let file_appender = tracing_appender::rolling::never(&config.output_dir, "experiment.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(level),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(level),
        )
        .init();

    info!("{}", "=".repeat(70));
    info!("LINEAR PROBE EXPERIMENT");
    info!("{}", "=".repeat(70));
    config.log();

    let model = ProbeModel::from_pretrained(&config.model_id, config.force_cpu)
        .context("Failed to load model")?;

    let experiment = Experiment::new(&model, &config);
    let table = experiment.run()?;

    let results_path = config.output_dir.join("raw_results.csv");
    table.write_csv(&results_path)?;
    info!("Raw results saved to: {}", results_path.display());

    let tasks: Vec<(String, String)> = config
        .tasks
        .iter()
        .map(|task| (task.name().to_string(), task.title().to_string()))
        .collect();
    let n_plots = plot::render_all(
        &table,
        &tasks,
        &config.methods,
        config.ci_level,
        &config.output_dir.join("plots"),
    )?;
    info!("Generated {} plots", n_plots);

    info!("Experiment complete");
    Ok(())
}
