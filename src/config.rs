//! Run configuration
//!
//! A single typed struct resolved once at startup. Merge order for every
//! field: an explicitly given CLI flag wins, then a value from the optional
//! JSON config file, then the built-in default.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::baseline::SizePolicy;
use crate::dataset::{default_tasks, Task};
use crate::model::HookPoint;
use crate::results::ProbeMethod;

pub const DEFAULT_MODEL: &str = "gpt2";
pub const DEFAULT_HOOK: &str = "resid_post";
pub const DEFAULT_LAYERS: &str = "1-11";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs/linear_probe";
pub const DEFAULT_N_COMPONENTS: usize = 10;
pub const DEFAULT_N_RUNS: usize = 3;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_SUBSETS: usize = 3;
pub const DEFAULT_FIXED_SIZE_RATIO: usize = 20;
pub const DEFAULT_CI_LEVEL: f64 = 0.95;

/// Values taken from the command line; `None` means the flag was absent.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub hook: Option<String>,
    pub layers: Option<String>,
    pub output: Option<PathBuf>,
    pub n_components: Option<usize>,
    pub n_runs: Option<usize>,
    pub seed: Option<u64>,
    pub tasks: Option<String>,
    pub methods: Option<String>,
    pub n_subsets: Option<usize>,
    pub subset_size_policy: Option<String>,
    pub fixed_size_ratio: Option<usize>,
    pub subset_mean: Option<usize>,
    pub subset_std: Option<f64>,
    pub ci_level: Option<f64>,
    pub force_cpu: bool,
}

/// Optional JSON config file schema.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    model: Option<String>,
    hook: Option<String>,
    layers: Option<LayersSpec>,
    output_dir: Option<PathBuf>,
    n_components: Option<usize>,
    n_runs: Option<usize>,
    seed: Option<u64>,
    tasks: Option<Vec<String>>,
    methods: Option<Vec<String>>,
    n_subsets: Option<usize>,
    subset_size_policy: Option<String>,
    fixed_size_ratio: Option<usize>,
    subset_mean: Option<usize>,
    subset_std: Option<f64>,
    ci_level: Option<f64>,
}

/// Layers in a config file: either an explicit list or a spec string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LayersSpec {
    List(Vec<usize>),
    Spec(String),
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model_id: String,
    pub hook: HookPoint,
    pub layers: Vec<usize>,
    pub output_dir: PathBuf,
    pub n_components: usize,
    pub n_runs: usize,
    pub seed: u64,
    pub tasks: Vec<Task>,
    pub methods: Vec<ProbeMethod>,
    pub n_subsets: usize,
    pub size_policy: SizePolicy,
    pub ci_level: f64,
    pub force_cpu: bool,
}

impl RunConfig {
    /// Resolve the configuration from CLI overrides and the optional file.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };

        let layers = match (&cli.layers, &file.layers) {
            (Some(spec), _) => parse_layers(spec)?,
            (None, Some(LayersSpec::List(list))) => {
                anyhow::ensure!(!list.is_empty(), "config file lists no layers");
                list.clone()
            }
            (None, Some(LayersSpec::Spec(spec))) => parse_layers(spec)?,
            (None, None) => parse_layers(DEFAULT_LAYERS)?,
        };

        let hook_str = cli
            .hook
            .clone()
            .or(file.hook.clone())
            .unwrap_or_else(|| DEFAULT_HOOK.to_string());
        let hook = hook_str.parse::<HookPoint>()?;

        let tasks = match (&cli.tasks, &file.tasks) {
            (Some(csv), _) => parse_name_list::<Task>(csv)?,
            (None, Some(names)) => names
                .iter()
                .map(|name| name.parse::<Task>())
                .collect::<Result<Vec<_>>>()?,
            (None, None) => default_tasks(),
        };
        anyhow::ensure!(!tasks.is_empty(), "no tasks configured");

        let methods = match (&cli.methods, &file.methods) {
            (Some(csv), _) => parse_name_list::<ProbeMethod>(csv)?,
            (None, Some(names)) => names
                .iter()
                .map(|name| name.parse::<ProbeMethod>())
                .collect::<Result<Vec<_>>>()?,
            (None, None) => vec![ProbeMethod::Pca, ProbeMethod::Random],
        };
        anyhow::ensure!(!methods.is_empty(), "no probe methods configured");

        let size_policy = resolve_size_policy(cli, &file)?;

        let n_components = cli
            .n_components
            .or(file.n_components)
            .unwrap_or(DEFAULT_N_COMPONENTS);
        let n_runs = cli.n_runs.or(file.n_runs).unwrap_or(DEFAULT_N_RUNS);
        let n_subsets = cli.n_subsets.or(file.n_subsets).unwrap_or(DEFAULT_N_SUBSETS);
        let ci_level = cli.ci_level.or(file.ci_level).unwrap_or(DEFAULT_CI_LEVEL);

        anyhow::ensure!(n_components >= 1, "n_components must be at least 1");
        anyhow::ensure!(n_runs >= 1, "n_runs must be at least 1");
        anyhow::ensure!(n_subsets >= 1, "n_subsets must be at least 1");
        anyhow::ensure!(
            ci_level > 0.0 && ci_level < 1.0,
            "ci_level must be in (0, 1), got {ci_level}"
        );

        Ok(RunConfig {
            model_id: cli
                .model
                .clone()
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            hook,
            layers,
            output_dir: cli
                .output
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            n_components,
            n_runs,
            seed: cli.seed.or(file.seed).unwrap_or(DEFAULT_SEED),
            tasks,
            methods,
            n_subsets,
            size_policy,
            ci_level,
            force_cpu: cli.force_cpu,
        })
    }

    /// Echo the resolved configuration into the run log.
    pub fn log(&self) {
        info!("Model: {}", self.model_id);
        info!("Hook point: {}", self.hook);
        info!("Layers: {:?}", self.layers);
        info!("Output directory: {}", self.output_dir.display());
        info!(
            "Tasks: {:?}",
            self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>()
        );
        info!(
            "Methods: {:?}",
            self.methods
                .iter()
                .map(|m| m.name())
                .collect::<Vec<_>>()
        );
        info!(
            "PCA: {} components, {} runs; random baseline: {} subsets, policy {}",
            self.n_components, self.n_runs, self.n_subsets, self.size_policy
        );
        info!(
            "Random seed: {}, CI level: {}",
            self.seed, self.ci_level
        );
    }
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn resolve_size_policy(cli: &CliOverrides, file: &FileConfig) -> Result<SizePolicy> {
    let name = cli
        .subset_size_policy
        .clone()
        .or_else(|| file.subset_size_policy.clone())
        .unwrap_or_else(|| "gaussian".to_string());

    let ratio = cli.fixed_size_ratio.or(file.fixed_size_ratio);
    let mean = cli.subset_mean.or(file.subset_mean);
    let std = cli.subset_std.or(file.subset_std);

    match name.as_str() {
        "fixed" => {
            anyhow::ensure!(
                mean.is_none() && std.is_none(),
                "subset_mean/subset_std only apply to the gaussian policy"
            );
            let ratio = ratio.unwrap_or(DEFAULT_FIXED_SIZE_RATIO);
            anyhow::ensure!(ratio >= 1, "fixed_size_ratio must be at least 1");
            Ok(SizePolicy::Fixed { ratio })
        }
        "uniform" => {
            anyhow::ensure!(
                ratio.is_none() && mean.is_none() && std.is_none(),
                "uniform policy takes no size parameters"
            );
            Ok(SizePolicy::Uniform)
        }
        "gaussian" => {
            anyhow::ensure!(
                ratio.is_none(),
                "fixed_size_ratio only applies to the fixed policy"
            );
            if let Some(std) = std {
                anyhow::ensure!(std > 0.0, "subset_std must be positive");
            }
            Ok(SizePolicy::Gaussian { mean, std })
        }
        other => anyhow::bail!(
            "unknown subset size policy '{other}' (expected fixed, uniform, or gaussian)"
        ),
    }
}

/// Parse a layer specification: a range `1-11`, a comma list `1,5,10`, or a
/// single index `3`.
pub fn parse_layers(spec: &str) -> Result<Vec<usize>> {
    let spec = spec.trim();
    anyhow::ensure!(!spec.is_empty(), "empty layer specification");

    if let Some((start, end)) = spec.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .with_context(|| format!("malformed layer range '{spec}'"))?;
        let end: usize = end
            .trim()
            .parse()
            .with_context(|| format!("malformed layer range '{spec}'"))?;
        anyhow::ensure!(start <= end, "layer range '{spec}' is reversed");
        return Ok((start..=end).collect());
    }

    if spec.contains(',') {
        return spec
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .with_context(|| format!("malformed layer list '{spec}'"))
            })
            .collect();
    }

    Ok(vec![spec
        .parse::<usize>()
        .with_context(|| format!("malformed layer index '{spec}'"))?])
}

fn parse_name_list<T>(csv: &str) -> Result<Vec<T>>
where
    T: FromStr<Err = anyhow::Error>,
{
    let items: Vec<T> = csv
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!items.is_empty(), "empty list '{csv}'");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layers_range() {
        assert_eq!(parse_layers("1-4").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_layers_list_and_single() {
        assert_eq!(parse_layers("1, 5,10").unwrap(), vec![1, 5, 10]);
        assert_eq!(parse_layers("7").unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_layers_malformed() {
        assert!(parse_layers("").is_err());
        assert!(parse_layers("a-b").is_err());
        assert!(parse_layers("9-3").is_err());
        assert!(parse_layers("1,x").is_err());
    }

    #[test]
    fn test_defaults_without_cli_or_file() {
        let config = RunConfig::resolve(&CliOverrides::default()).unwrap();
        assert_eq!(config.model_id, "gpt2");
        assert_eq!(config.hook, HookPoint::ResidPost);
        assert_eq!(config.layers, (1..=11).collect::<Vec<_>>());
        assert_eq!(config.n_components, 10);
        assert_eq!(config.n_runs, 3);
        assert_eq!(config.seed, 42);
        assert_eq!(config.n_subsets, 3);
        assert_eq!(
            config.size_policy,
            SizePolicy::Gaussian {
                mean: None,
                std: None
            }
        );
        assert!((config.ci_level - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_missing_config_file_is_fatal() {
        let cli = CliOverrides {
            config: Some(PathBuf::from("/nonexistent/config.json")),
            ..Default::default()
        };
        assert!(RunConfig::resolve(&cli).is_err());
    }

    #[test]
    fn test_invalid_policy_combination() {
        let cli = CliOverrides {
            subset_size_policy: Some("uniform".to_string()),
            fixed_size_ratio: Some(20),
            ..Default::default()
        };
        assert!(RunConfig::resolve(&cli).is_err());
    }

    #[test]
    fn test_fixed_policy_with_ratio() {
        let cli = CliOverrides {
            subset_size_policy: Some("fixed".to_string()),
            fixed_size_ratio: Some(16),
            ..Default::default()
        };
        let config = RunConfig::resolve(&cli).unwrap();
        assert_eq!(config.size_policy, SizePolicy::Fixed { ratio: 16 });
    }

    #[test]
    fn test_ci_level_bounds() {
        let cli = CliOverrides {
            ci_level: Some(1.0),
            ..Default::default()
        };
        assert!(RunConfig::resolve(&cli).is_err());
    }
}
