//! Model wrapper for activation extraction
//!
//! Owns the tokenizer, device, and a boxed backend implementing the forward
//! pass with per-layer activation capture.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::info;

use crate::cache::LayerCache;
use crate::forward_gpt2::GptModel;

/// Addressable point inside a transformer block's computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Residual stream entering the block.
    ResidPre,
    /// Residual stream leaving the block.
    ResidPost,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPoint::ResidPre => f.write_str("resid_pre"),
            HookPoint::ResidPost => f.write_str("resid_post"),
        }
    }
}

impl FromStr for HookPoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resid_pre" => Ok(HookPoint::ResidPre),
            "resid_post" => Ok(HookPoint::ResidPost),
            other => anyhow::bail!("unknown hook point '{other}' (expected resid_pre or resid_post)"),
        }
    }
}

/// Backend trait: the forward pass with activation capture.
///
/// Implementing this is the only requirement for probing a new
/// architecture.
pub trait ProbeBackend {
    fn n_layers(&self) -> usize;
    fn d_model(&self) -> usize;

    /// Run the model on `(1, seq_len)` token ids, capturing the hook tensor
    /// of every layer. Returns the final logits and the per-layer cache.
    fn forward_with_cache(&self, input_ids: &Tensor, hook: HookPoint)
        -> Result<(Tensor, LayerCache)>;
}

/// What the extraction loop needs from a model: tokenization, per-token
/// decoding, and a cached forward pass.
pub trait ActivationSource {
    fn to_tokens(&self, text: &str) -> Result<Vec<u32>>;
    fn token_strings(&self, ids: &[u32]) -> Result<Vec<String>>;
    fn run_with_cache(&self, ids: &[u32], hook: HookPoint) -> Result<LayerCache>;
    fn n_layers(&self) -> usize;
    fn d_model(&self) -> usize;
}

/// High-level model wrapper for probing experiments.
pub struct ProbeModel {
    backend: Box<dyn ProbeBackend>,
    tokenizer: Tokenizer,
    device: Device,
}

impl ProbeModel {
    /// Load a model from the HuggingFace hub (CUDA if available, unless
    /// `force_cpu`).
    pub fn from_pretrained(model_id: &str, force_cpu: bool) -> Result<Self> {
        let device = if force_cpu {
            info!("Forcing CPU mode");
            Device::Cpu
        } else {
            match Device::cuda_if_available(0) {
                Ok(dev) if dev.is_cuda() => {
                    info!("Using CUDA device");
                    dev
                }
                _ => {
                    info!("CUDA not available, using CPU");
                    Device::Cpu
                }
            }
        };

        info!("Loading model: {}", model_id);

        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Tokenizer error: {e}"))?;

        let backend: Box<dyn ProbeBackend> = Box::new(GptModel::load(model_id, &device)?);

        info!(
            "Model loaded: {} layers, {} hidden",
            backend.n_layers(),
            backend.d_model()
        );

        Ok(Self {
            backend,
            tokenizer,
            device,
        })
    }

    pub fn n_layers(&self) -> usize {
        self.backend.n_layers()
    }

    pub fn d_model(&self) -> usize {
        self.backend.d_model()
    }
}

impl ActivationSource for ProbeModel {
    /// Tokenize without special tokens: the locator reconstructs character
    /// offsets from decoded fragments, so no BOS marker may be prepended.
    fn to_tokens(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenization error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode each token individually, preserving leading-space fragments.
    fn token_strings(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                self.tokenizer
                    .decode(&[id], false)
                    .map_err(|e| anyhow::anyhow!("Decode error: {e}"))
            })
            .collect()
    }

    fn run_with_cache(&self, ids: &[u32], hook: HookPoint) -> Result<LayerCache> {
        anyhow::ensure!(!ids.is_empty(), "cannot run the model on empty input");
        let input = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let (_logits, cache) = self.backend.forward_with_cache(&input, hook)?;
        Ok(cache)
    }

    fn n_layers(&self) -> usize {
        self.backend.n_layers()
    }

    fn d_model(&self) -> usize {
        self.backend.d_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_point_round_trip() {
        assert_eq!("resid_pre".parse::<HookPoint>().unwrap(), HookPoint::ResidPre);
        assert_eq!(
            "resid_post".parse::<HookPoint>().unwrap(),
            HookPoint::ResidPost
        );
        assert!("attn_out".parse::<HookPoint>().is_err());
        assert_eq!(HookPoint::ResidPost.to_string(), "resid_post");
    }
}
