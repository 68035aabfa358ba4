//! Per-layer residual-stream cache from a forward pass

use anyhow::Result;
use candle_core::{IndexOp, Tensor};

/// Stores the residual stream captured at one hook point for every layer.
///
/// Each tensor has shape `(seq_len, d_model)`; layer `l` of the cache is the
/// hook tensor of block `l`.
#[derive(Debug)]
pub struct LayerCache {
    layers: Vec<Tensor>,
}

impl LayerCache {
    /// Create an empty cache with capacity for `n_layers`.
    pub fn with_capacity(n_layers: usize) -> Self {
        Self {
            layers: Vec::with_capacity(n_layers),
        }
    }

    /// Add a layer's `(seq_len, d_model)` tensor to the cache.
    pub fn push(&mut self, tensor: Tensor) {
        self.layers.push(tensor);
    }

    /// Get the full hook tensor for a specific layer.
    pub fn get_layer(&self, layer: usize) -> Option<&Tensor> {
        self.layers.get(layer)
    }

    /// Extract the activation vector at a layer and token position as f64.
    ///
    /// Returns a `d_model`-length vector.
    pub fn position_vector(&self, layer: usize, position: usize) -> Result<Vec<f64>> {
        let layer_tensor = self
            .layers
            .get(layer)
            .ok_or_else(|| anyhow::anyhow!("Layer {layer} not in cache"))?;
        let seq_len = layer_tensor.dim(0)?;
        anyhow::ensure!(
            position < seq_len,
            "Position {position} out of range (seq_len={seq_len})"
        );
        let row = layer_tensor.i(position)?;
        let values: Vec<f32> = row.to_dtype(candle_core::DType::F32)?.to_vec1()?;
        Ok(values.into_iter().map(f64::from).collect())
    }

    /// Number of cached layers.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Sequence length, taken from the first layer's tensor.
    pub fn seq_len(&self) -> Result<usize> {
        let first = self
            .layers
            .first()
            .ok_or_else(|| anyhow::anyhow!("Cache is empty"))?;
        Ok(first.dim(0)?)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_cache_basic() {
        let device = Device::Cpu;
        let seq_len = 6;
        let d_model = 768;

        let mut cache = LayerCache::with_capacity(2);
        assert!(cache.is_empty());

        let t1 = Tensor::zeros((seq_len, d_model), DType::F32, &device).unwrap();
        let t2 = Tensor::zeros((seq_len, d_model), DType::F32, &device).unwrap();
        cache.push(t1);
        cache.push(t2);

        assert_eq!(cache.n_layers(), 2);
        assert_eq!(cache.seq_len().unwrap(), seq_len);
        assert!(cache.get_layer(1).is_some());
        assert!(cache.get_layer(2).is_none());
    }

    #[test]
    fn test_position_vector_bounds() {
        let device = Device::Cpu;
        let mut cache = LayerCache::with_capacity(1);
        cache.push(Tensor::zeros((4, 16), DType::F32, &device).unwrap());

        let v = cache.position_vector(0, 3).unwrap();
        assert_eq!(v.len(), 16);

        assert!(cache.position_vector(0, 4).is_err());
        assert!(cache.position_vector(1, 0).is_err());
    }
}
