//! GPT-2 forward pass with per-layer activation capture
//!
//! Custom implementation that runs block-by-block so the residual stream
//! can be read at every layer, at either side of a block.
//!
//! GPT-2 differs from the newer decoder families in a few ways that matter
//! here: learned absolute position embeddings instead of RoPE, classic
//! LayerNorm with bias, a fused qkv projection stored in Conv1D layout
//! (weights transposed relative to `Linear`), and a GELU MLP.

use anyhow::{Context, Result};
use candle_core::{DType, Device, IndexOp, Module, Tensor, D};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, VarBuilder};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tracing::info;

use crate::cache::LayerCache;
use crate::model::{HookPoint, ProbeBackend};

/// Model configuration (matches HuggingFace config.json for GPT-2)
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GptConfig {
    pub n_embd: usize,
    pub n_head: usize,
    pub n_layer: usize,
    pub n_positions: usize,
    pub vocab_size: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

/// GPT-2 checkpoint linear layer.
///
/// The original implementation stored these as 1D convolutions, so the
/// weight has shape `(in_features, out_features)` and is applied without
/// transposition.
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((in_features, out_features), "weight")?;
        let bias = vb.get(out_features, "bias")?;
        Ok(Self { weight, bias })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.broadcast_matmul(&self.weight)?
            .broadcast_add(&self.bias)?)
    }
}

/// Multi-head attention with the fused qkv projection.
struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(vb: VarBuilder, config: &GptConfig) -> Result<Self> {
        let n_embd = config.n_embd;
        let c_attn = Conv1D::load(n_embd, 3 * n_embd, vb.pp("c_attn"))?;
        let c_proj = Conv1D::load(n_embd, n_embd, vb.pp("c_proj"))?;
        Ok(Self {
            c_attn,
            c_proj,
            n_head: config.n_head,
            head_dim: n_embd / config.n_head,
        })
    }

    fn forward(&self, x: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (b, seq_len, _) = x.dims3()?;
        let n_embd = self.n_head * self.head_dim;

        // Narrowing the fused projection leaves strided tensors; make them
        // contiguous before the head reshape.
        let qkv = self.c_attn.forward(x)?;
        let q = qkv.narrow(D::Minus1, 0, n_embd)?.contiguous()?;
        let k = qkv.narrow(D::Minus1, n_embd, n_embd)?.contiguous()?;
        let v = qkv.narrow(D::Minus1, 2 * n_embd, n_embd)?.contiguous()?;

        let q = q
            .reshape((b, seq_len, self.n_head, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let k = k
            .reshape((b, seq_len, self.n_head, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let v = v
            .reshape((b, seq_len, self.n_head, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let attn_weights = (q.matmul(&k.transpose(2, 3)?.contiguous()?)? * scale)?;
        let attn_weights = attn_weights.broadcast_add(mask)?;
        let attn_weights = candle_nn::ops::softmax_last_dim(&attn_weights)?;

        let attn_output = attn_weights.matmul(&v)?;
        let attn_output = attn_output
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, seq_len, n_embd))?;
        self.c_proj.forward(&attn_output)
    }
}

/// GELU feed-forward block.
struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(vb: VarBuilder, config: &GptConfig) -> Result<Self> {
        let c_fc = Conv1D::load(config.n_embd, 4 * config.n_embd, vb.pp("c_fc"))?;
        let c_proj = Conv1D::load(4 * config.n_embd, config.n_embd, vb.pp("c_proj"))?;
        Ok(Self { c_fc, c_proj })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // GPT-2 uses the tanh-approximated GELU.
        let x = self.c_fc.forward(x)?.gelu()?;
        self.c_proj.forward(&x)
    }
}

/// Single pre-LayerNorm transformer block.
struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(vb: VarBuilder, config: &GptConfig) -> Result<Self> {
        let ln_1 = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_1"))?;
        let attn = Attention::load(vb.pp("attn"), config)?;
        let ln_2 = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_2"))?;
        let mlp = Mlp::load(vb.pp("mlp"), config)?;
        Ok(Self {
            ln_1,
            attn,
            ln_2,
            mlp,
        })
    }

    fn forward(&self, x: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let residual = x;
        let x = self.ln_1.forward(x)?;
        let x = self.attn.forward(&x, mask)?;
        let x = (residual + x)?;

        let residual = &x;
        let x = self.ln_2.forward(&x)?;
        let x = self.mlp.forward(&x)?;
        Ok((residual + x)?)
    }
}

/// Additive causal mask: 0 below the diagonal, -inf above.
fn causal_mask(seq_len: usize, device: &Device, dtype: DType) -> Result<Tensor> {
    let values: Vec<f32> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| if j <= i { 0.0 } else { f32::NEG_INFINITY }))
        .collect();
    Ok(Tensor::from_vec(values, (seq_len, seq_len), device)?.to_dtype(dtype)?)
}

/// Safetensors index for sharded checkpoints.
#[derive(Debug, serde::Deserialize)]
struct SafetensorsIndex {
    weight_map: std::collections::HashMap<String, String>,
}

/// GPT-2 model with per-layer activation capture.
pub struct GptModel {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    n_layer: usize,
    n_embd: usize,
    n_positions: usize,
}

impl GptModel {
    /// Load a GPT-2 family checkpoint from the HuggingFace hub.
    pub fn load(model_id: &str, device: &Device) -> Result<Self> {
        info!("Loading GPT-2 checkpoint: {}", model_id);

        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("Failed to download config.json")?;
        let config_str = std::fs::read_to_string(&config_path).context("Failed to read config")?;
        let config: GptConfig = serde_json::from_str(&config_str)?;

        info!(
            "Model config: {} layers, {} hidden, {} vocab",
            config.n_layer, config.n_embd, config.vocab_size
        );

        let weights_paths = if let Ok(index_path) = repo.get("model.safetensors.index.json") {
            info!("Model is sharded, loading index...");
            let index_str = std::fs::read_to_string(&index_path).context("Failed to read index")?;
            let index: SafetensorsIndex = serde_json::from_str(&index_str)?;

            let mut shard_names: Vec<String> = index.weight_map.values().cloned().collect();
            shard_names.sort();
            shard_names.dedup();

            let mut paths = Vec::new();
            for shard_name in &shard_names {
                let path = repo
                    .get(shard_name)
                    .with_context(|| format!("Failed to download {shard_name}"))?;
                paths.push(path);
            }
            paths
        } else {
            let path = repo
                .get("model.safetensors")
                .context("Failed to download model.safetensors")?;
            vec![path]
        };

        // GPT-2 is small enough that F32 on either device is fine.
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&weights_paths, DType::F32, device)? };

        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;

        let mut blocks = Vec::with_capacity(config.n_layer);
        for i in 0..config.n_layer {
            let block = Block::load(vb.pp("h").pp(i.to_string()), &config)?;
            blocks.push(block);
        }

        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;

        info!("Model loaded with {} layers", config.n_layer);

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            n_layer: config.n_layer,
            n_embd: config.n_embd,
            n_positions: config.n_positions,
        })
    }
}

impl ProbeBackend for GptModel {
    fn n_layers(&self) -> usize {
        self.n_layer
    }

    fn d_model(&self) -> usize {
        self.n_embd
    }

    fn forward_with_cache(
        &self,
        input_ids: &Tensor,
        hook: HookPoint,
    ) -> Result<(Tensor, LayerCache)> {
        let (_batch, seq_len) = input_ids.dims2()?;
        anyhow::ensure!(
            seq_len <= self.n_positions,
            "sequence length {} exceeds model context {}",
            seq_len,
            self.n_positions
        );

        let device = input_ids.device();
        let positions = Tensor::arange(0u32, seq_len as u32, device)?.unsqueeze(0)?;
        let mut hidden = self
            .wte
            .forward(input_ids)?
            .broadcast_add(&self.wpe.forward(&positions)?)?;

        let mask = causal_mask(seq_len, device, hidden.dtype())?;
        let mut cache = LayerCache::with_capacity(self.n_layer);

        for block in &self.blocks {
            if hook == HookPoint::ResidPre {
                // Single-example batches only; drop the batch dimension.
                cache.push(hidden.i(0)?);
            }
            hidden = block.forward(&hidden, &mask)?;
            if hook == HookPoint::ResidPost {
                cache.push(hidden.i(0)?);
            }
        }

        let normed = self.ln_f.forward(&hidden)?;
        // GPT-2 ties the unembedding to the token embedding matrix.
        let logits = normed.broadcast_matmul(&self.wte.embeddings().t()?)?;

        Ok((logits, cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_causal_mask_values() {
        let mask = causal_mask(3, &Device::Cpu, DType::F32).unwrap();
        let values: Vec<Vec<f32>> = mask.to_vec2().unwrap();

        assert_eq!(values[0][0], 0.0);
        assert_eq!(values[2][1], 0.0);
        assert!(values[0][1].is_infinite() && values[0][1] < 0.0);
        assert!(values[1][2].is_infinite() && values[1][2] < 0.0);
    }

    #[test]
    fn test_conv1d_applies_untransposed_weight() {
        let device = Device::Cpu;
        // weight (in=2, out=3): y = x @ w + b
        let weight =
            Tensor::from_vec(vec![1f32, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3), &device).unwrap();
        let bias = Tensor::from_vec(vec![0.5f32, 0.5, 0.5], (3,), &device).unwrap();
        let conv = Conv1D { weight, bias };

        let x = Tensor::from_vec(vec![1f32, 1.0], (1, 1, 2), &device).unwrap();
        let y: Vec<f32> = conv
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_eq!(y, vec![5.5, 7.5, 9.5]);
    }
}
