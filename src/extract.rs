//! Activation extraction over a dataset
//!
//! Drives the model over every example of a task, locates the target word's
//! token position, and assembles the activation matrix with its aligned
//! label vector. Examples whose target word cannot be located are skipped
//! with a warning; row `i` of the matrix always corresponds to entry `i` of
//! the labels and to the `i`-th non-skipped example in dataset order.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::dataset::Example;
use crate::model::{ActivationSource, HookPoint};
use crate::positioning::find_target_position;

/// Extract one activation vector per example at the target token position.
///
/// Returns an `(n_examples, d_model)` matrix and an `(n_examples,)` label
/// vector, where `n_examples` counts only the examples whose target word
/// was located.
pub fn extract_activations<M: ActivationSource>(
    model: &M,
    examples: &[Example],
    layer: usize,
    hook: HookPoint,
) -> Result<(Array2<f64>, Array1<usize>)> {
    anyhow::ensure!(
        layer < model.n_layers(),
        "layer {} out of range (model has {} layers)",
        layer,
        model.n_layers()
    );

    let mut flat: Vec<f64> = Vec::new();
    let mut labels: Vec<usize> = Vec::new();
    let mut positions: Vec<usize> = Vec::new();
    let mut width: Option<usize> = None;
    let mut skipped = 0usize;

    for example in examples {
        let ids = model.to_tokens(&example.text)?;
        let token_strs = model.token_strings(&ids)?;

        let position = match find_target_position(&token_strs, &example.text, &example.target_word)
        {
            Ok(position) => position,
            Err(err) => {
                warn!("Skipping example: {err}");
                skipped += 1;
                continue;
            }
        };

        let cache = model
            .run_with_cache(&ids, hook)
            .with_context(|| format!("forward pass failed for '{}'", example.text))?;
        let vector = cache.position_vector(layer, position)?;

        match width {
            None => width = Some(vector.len()),
            Some(w) => anyhow::ensure!(
                w == vector.len(),
                "inconsistent activation width: {} vs {}",
                w,
                vector.len()
            ),
        }

        flat.extend_from_slice(&vector);
        labels.push(example.label);
        positions.push(position);
    }

    anyhow::ensure!(
        !labels.is_empty(),
        "no examples could be extracted (all {} skipped)",
        examples.len()
    );

    let n = labels.len();
    let d = width.unwrap_or(0);
    let activations =
        Array2::from_shape_vec((n, d), flat).context("Failed to build activation matrix")?;
    let labels = Array1::from_vec(labels);

    info!(
        "  Extracted {} activations of width {} ({} skipped)",
        n, d, skipped
    );

    let mut position_counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &position in &positions {
        *position_counts.entry(position).or_insert(0) += 1;
    }
    debug!("  Token position distribution: {:?}", position_counts);

    Ok((activations, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LayerCache;
    use candle_core::{Device, Tensor};

    /// Whitespace "tokenizer" backed by synthetic activations: the vector at
    /// every position of layer `l` is `[token_count, l, position, ...]`.
    struct FakeSource {
        n_layers: usize,
        d_model: usize,
    }

    impl ActivationSource for FakeSource {
        fn to_tokens(&self, text: &str) -> Result<Vec<u32>> {
            Ok((0..text.split_whitespace().count() as u32).collect())
        }

        fn token_strings(&self, ids: &[u32]) -> Result<Vec<String>> {
            // Fragments re-assemble into "w0 w1 w2 ..."-like text of the
            // same length structure as the original words.
            Ok(ids.iter().map(|&id| format!("tok{id} ")).collect())
        }

        fn run_with_cache(&self, ids: &[u32], _hook: HookPoint) -> Result<LayerCache> {
            let device = Device::Cpu;
            let mut cache = LayerCache::with_capacity(self.n_layers);
            for layer in 0..self.n_layers {
                let data: Vec<f32> = (0..ids.len() * self.d_model)
                    .map(|k| {
                        let position = k / self.d_model;
                        (ids.len() * 100 + layer * 10 + position) as f32
                    })
                    .collect();
                cache.push(Tensor::from_vec(data, (ids.len(), self.d_model), &device)?);
            }
            Ok(cache)
        }

        fn n_layers(&self) -> usize {
            self.n_layers
        }

        fn d_model(&self) -> usize {
            self.d_model
        }
    }

    fn example(text: &str, target: &str, label: usize) -> Example {
        Example {
            text: text.to_string(),
            target_word: target.to_string(),
            label,
        }
    }

    #[test]
    fn test_rows_align_with_labels_and_skips() {
        let model = FakeSource {
            n_layers: 2,
            d_model: 4,
        };
        let examples = vec![
            example("alpha beta gamma", "beta", 0),
            // Target absent: skipped, but the following rows stay aligned.
            example("alpha beta gamma", "omega", 1),
            example("one two", "two", 1),
        ];

        let (x, y) = extract_activations(&model, &examples, 1, HookPoint::ResidPost).unwrap();

        assert_eq!(x.nrows(), 2);
        assert_eq!(y.len(), 2);
        assert_eq!(y[0], 0);
        assert_eq!(y[1], 1);
        // Width matches the fake model's d_model.
        assert_eq!(x.ncols(), 4);
    }

    #[test]
    fn test_all_skipped_is_an_error() {
        let model = FakeSource {
            n_layers: 1,
            d_model: 2,
        };
        let examples = vec![example("alpha beta", "omega", 0)];
        assert!(extract_activations(&model, &examples, 0, HookPoint::ResidPost).is_err());
    }

    #[test]
    fn test_layer_out_of_range() {
        let model = FakeSource {
            n_layers: 2,
            d_model: 2,
        };
        let examples = vec![example("alpha beta", "beta", 0)];
        assert!(extract_activations(&model, &examples, 5, HookPoint::ResidPost).is_err());
    }
}
