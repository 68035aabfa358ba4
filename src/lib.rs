// Pedantic clippy configuration for ML/math codebase
// These are acceptable in numerical/ML code:
#![allow(clippy::cast_precision_loss)] // usize→f64/f32 intentional in ML
#![allow(clippy::cast_possible_truncation)] // usize→u32 in tensor indexing
#![allow(clippy::many_single_char_names)] // x, y, i, j standard in math
#![allow(clippy::similar_names)] // related variables like `mean`/`means`
#![allow(clippy::module_name_repetitions)] // ProbeModel in model.rs is fine
// Documentation pedantic - acceptable for research code:
#![allow(clippy::doc_markdown)] // backticks for every technical term is excessive
#![allow(clippy::missing_errors_doc)] // # Errors section for every Result fn
#![allow(clippy::missing_panics_doc)] // # Panics section for every panic
// Method style pedantic:
#![allow(clippy::must_use_candidate)] // #[must_use] on every pure fn is excessive
#![allow(clippy::cast_sign_loss)] // f64→usize when value is known positive

//! linprobe-rs: Linguistic Linear Probing
//!
//! Measures how linearly decodable linguistic properties (part of speech,
//! sentiment, named-entity status, word length, verb tense, plurality) are
//! from each layer of a GPT-2 family model.
//!
//! ## Architecture
//!
//! - `model`: High-level ProbeModel wrapper for activation extraction
//! - `forward_gpt2`: GPT-2 forward pass with per-layer activation capture
//! - `cache`: Per-layer residual-stream cache
//! - `positioning`: Target-word token positioning via incremental decode
//! - `dataset`: Probing tasks and their curated datasets
//! - `extract`: Dataset-to-matrix activation extraction
//! - `probe`: Logistic-regression probes and decodability metrics
//! - `pca`: PCA probe path (reduce, then probe repeatedly)
//! - `baseline`: Random-subset baseline probe path
//! - `diagnostics`: Read-only activation/label diagnostics
//! - `results`: Results table and CSV persistence
//! - `plot`: Per-layer bar charts with confidence intervals
//! - `experiment`: Experiment runner coordinating the full pipeline
//! - `config`: Typed run configuration with explicit merge order

pub mod baseline;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod experiment;
pub mod extract;
pub mod forward_gpt2;
pub mod model;
pub mod pca;
pub mod plot;
pub mod positioning;
pub mod probe;
pub mod results;

pub use baseline::{random_probe, RandomProbeReport, SizePolicy};
pub use cache::LayerCache;
pub use config::{CliOverrides, RunConfig};
pub use dataset::{default_tasks, label_counts, Example, Task};
pub use error::LocateError;
pub use experiment::Experiment;
pub use extract::extract_activations;
pub use forward_gpt2::GptModel;
pub use model::{ActivationSource, HookPoint, ProbeBackend, ProbeModel};
pub use pca::{pca_probe, PcaProbeReport};
pub use positioning::find_target_position;
pub use probe::{accuracy, macro_f1, mutual_information, standardize, ProbeMetrics, ProbeTrainer};
pub use results::{Metric, ProbeMethod, ResultRecord, ResultsTable};
