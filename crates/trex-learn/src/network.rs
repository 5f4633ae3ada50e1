//! Neural reward network
//!
//! A multilayer perceptron over a flattened frame: leaky-ReLU hidden layers
//! followed by a linear scalar head. Frames in a batch are scored
//! independently, so a snippet is scored in one batched pass.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView4, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use trex_core::{FrameShape, Result, RewardModel, TrexError};

/// Reward network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardNetConfig {
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Negative slope of the leaky ReLU
    pub leaky_slope: f32,
}

impl Default for RewardNetConfig {
    fn default() -> Self {
        Self {
            hidden_dims: vec![64],
            leaky_slope: 0.01,
        }
    }
}

/// Fully connected layer, `weight` is `in x out`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    fn xavier<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        Self {
            weight: Array2::from_shape_fn((in_dim, out_dim), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(out_dim),
        }
    }

    fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weight) + &self.bias
    }

    fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Intermediate values of a forward pass, kept for backpropagation
#[derive(Debug, Clone, Default)]
pub struct ForwardCache {
    /// Input of every layer, starting with the flattened frames
    inputs: Vec<Array2<f32>>,
    /// Pre-activation output of every hidden layer
    pre_activations: Vec<Array2<f32>>,
}

/// Models whose parameters can be trained by gradient descent
pub trait Trainable: RewardModel {
    /// Flattened copy of all parameters
    fn parameters(&self) -> Vec<f32>;

    /// Overwrite all parameters from a flat slice
    fn set_parameters(&mut self, params: &[f32]) -> Result<()>;

    /// Score a batch and keep what the backward pass needs
    fn forward_cached(&self, frames: &ArrayView4<f32>) -> Result<(Array1<f32>, ForwardCache)>;

    /// Gradient of `sum_t upstream[t] * score[t]` with respect to the parameters
    fn backward(&self, cache: &ForwardCache, upstream: &ArrayView1<f32>) -> Result<Vec<f32>>;
}

/// MLP reward model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardNet {
    config: RewardNetConfig,
    frame_shape: FrameShape,
    layers: Vec<Dense>,
}

impl RewardNet {
    /// Create a network with Xavier-initialised weights
    pub fn new<R: Rng + ?Sized>(
        frame_shape: FrameShape,
        config: RewardNetConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if frame_shape.size() == 0 {
            return Err(TrexError::Config(format!(
                "frame shape {:?} has no features",
                frame_shape.to_vec()
            )));
        }
        if config.hidden_dims.contains(&0) {
            return Err(TrexError::Config(
                "hidden layer sizes must be positive".to_string(),
            ));
        }

        let mut layers = Vec::with_capacity(config.hidden_dims.len() + 1);
        let mut prev_dim = frame_shape.size();
        for &hidden_dim in &config.hidden_dims {
            layers.push(Dense::xavier(prev_dim, hidden_dim, rng));
            prev_dim = hidden_dim;
        }
        layers.push(Dense::xavier(prev_dim, 1, rng));

        Ok(Self {
            config,
            frame_shape,
            layers,
        })
    }

    /// Network configuration
    #[must_use]
    pub fn config(&self) -> &RewardNetConfig {
        &self.config
    }

    /// Total number of trainable scalars
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(Dense::num_parameters).sum()
    }

    /// Load parameters written by [`RewardNet::save`]
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let net: Self = serde_json::from_str(&json)?;
        net.validate()?;
        Ok(net)
    }

    /// Persist configuration and parameters as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Check that the layer dimensions chain from the frame to a scalar
    fn validate(&self) -> Result<()> {
        let mut prev_dim = self.frame_shape.size();
        for (i, layer) in self.layers.iter().enumerate() {
            let (rows, cols) = layer.weight.dim();
            if rows != prev_dim || layer.bias.len() != cols {
                return Err(TrexError::DimensionMismatch {
                    expected: vec![prev_dim, layer.bias.len()],
                    actual: vec![rows, cols],
                });
            }
            let is_head = i + 1 == self.layers.len();
            if is_head && cols != 1 {
                return Err(TrexError::DimensionMismatch {
                    expected: vec![1],
                    actual: vec![cols],
                });
            }
            prev_dim = cols;
        }
        if self.layers.is_empty() {
            return Err(TrexError::Config("network has no layers".to_string()));
        }
        Ok(())
    }

    fn flatten(&self, frames: &ArrayView4<f32>) -> Result<Array2<f32>> {
        self.frame_shape.ensure_batch(frames)?;
        let rows = frames.len_of(Axis(0));
        Array2::from_shape_vec((rows, self.frame_shape.size()), frames.iter().copied().collect())
            .map_err(|e| TrexError::Computation(e.to_string()))
    }

    fn leaky_relu(&self, x: &Array2<f32>) -> Array2<f32> {
        let slope = self.config.leaky_slope;
        x.mapv(|v| if v > 0.0 { v } else { slope * v })
    }

    fn leaky_relu_grad(&self, x: &Array2<f32>) -> Array2<f32> {
        let slope = self.config.leaky_slope;
        x.mapv(|v| if v > 0.0 { 1.0 } else { slope })
    }

    fn forward_impl(&self, frames: &ArrayView4<f32>) -> Result<(Array1<f32>, ForwardCache)> {
        let mut hidden = self.flatten(frames)?;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len().saturating_sub(1));

        let (head, hidden_layers) = self
            .layers
            .split_last()
            .ok_or_else(|| TrexError::Config("network has no layers".to_string()))?;

        for layer in hidden_layers {
            let z = layer.forward(&hidden);
            inputs.push(hidden);
            hidden = self.leaky_relu(&z);
            pre_activations.push(z);
        }

        let scores = head.forward(&hidden).index_axis_move(Axis(1), 0);
        inputs.push(hidden);

        Ok((
            scores,
            ForwardCache {
                inputs,
                pre_activations,
            },
        ))
    }
}

impl RewardModel for RewardNet {
    fn frame_shape(&self) -> FrameShape {
        self.frame_shape
    }

    fn score_batch(&self, frames: &ArrayView4<f32>) -> Result<Array1<f32>> {
        self.forward_impl(frames).map(|(scores, _)| scores)
    }
}

impl Trainable for RewardNet {
    fn parameters(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.num_parameters());
        for layer in &self.layers {
            params.extend(layer.weight.iter().copied());
            params.extend(layer.bias.iter().copied());
        }
        params
    }

    fn set_parameters(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.num_parameters() {
            return Err(TrexError::DimensionMismatch {
                expected: vec![self.num_parameters()],
                actual: vec![params.len()],
            });
        }

        let mut offset = 0;
        for layer in &mut self.layers {
            let weight_size = layer.weight.len();
            layer.weight = Array2::from_shape_vec(
                layer.weight.raw_dim(),
                params[offset..offset + weight_size].to_vec(),
            )
            .map_err(|e| TrexError::Computation(e.to_string()))?;
            offset += weight_size;

            let bias_size = layer.bias.len();
            layer.bias = Array1::from(params[offset..offset + bias_size].to_vec());
            offset += bias_size;
        }
        Ok(())
    }

    fn forward_cached(&self, frames: &ArrayView4<f32>) -> Result<(Array1<f32>, ForwardCache)> {
        self.forward_impl(frames)
    }

    fn backward(&self, cache: &ForwardCache, upstream: &ArrayView1<f32>) -> Result<Vec<f32>> {
        let rows = cache.inputs.first().map_or(0, |x| x.nrows());
        if upstream.len() != rows || cache.inputs.len() != self.layers.len() {
            return Err(TrexError::DimensionMismatch {
                expected: vec![rows],
                actual: vec![upstream.len()],
            });
        }

        // Gradient w.r.t. the output of the layer being processed
        let mut delta = upstream.to_owned().insert_axis(Axis(1));
        let mut grads: Vec<(Array2<f32>, Array1<f32>)> = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let input = &cache.inputs[i];
            grads.push((input.t().dot(&delta), delta.sum_axis(Axis(0))));

            if i > 0 {
                let upstream_hidden = delta.dot(&layer.weight.t());
                delta = upstream_hidden * self.leaky_relu_grad(&cache.pre_activations[i - 1]);
            }
        }

        let mut flat = Vec::with_capacity(self.num_parameters());
        for (weight_grad, bias_grad) in grads.iter().rev() {
            flat.extend(weight_grad.iter().copied());
            flat.extend(bias_grad.iter().copied());
        }
        Ok(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array4;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn net(hidden_dims: Vec<usize>, leaky_slope: f32) -> RewardNet {
        let mut rng = StdRng::seed_from_u64(11);
        RewardNet::new(
            FrameShape::new(2, 2, 1),
            RewardNetConfig {
                hidden_dims,
                leaky_slope,
            },
            &mut rng,
        )
        .unwrap()
    }

    fn frames() -> Array4<f32> {
        Array4::from_shape_fn((3, 2, 2, 1), |(t, h, w, _)| {
            0.1 * (t as f32 + 1.0) - 0.2 * h as f32 + 0.05 * w as f32
        })
    }

    fn weighted_sum(model: &RewardNet, frames: &Array4<f32>, upstream: &Array1<f32>) -> f32 {
        model.score_batch(&frames.view()).unwrap().dot(upstream)
    }

    #[test]
    fn scores_one_value_per_frame() {
        let model = net(vec![8, 4], 0.01);
        let scores = model.score_batch(&frames().view()).unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(model.num_parameters(), 4 * 8 + 8 + 8 * 4 + 4 + 4 + 1);
    }

    #[test]
    fn frame_scores_are_independent() {
        let model = net(vec![8], 0.01);
        let batch = frames();
        let scores = model.score_batch(&batch.view()).unwrap();
        for (t, frame) in batch.outer_iter().enumerate() {
            assert_abs_diff_eq!(model.score(&frame).unwrap() as f32, scores[t], epsilon = 1e-6);
        }
    }

    #[test]
    fn rejects_wrong_frame_shape() {
        let model = net(vec![4], 0.01);
        let bad = Array4::<f32>::zeros((2, 3, 2, 1));
        assert!(matches!(
            model.score_batch(&bad.view()),
            Err(TrexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn backward_matches_finite_differences() {
        // Slope 1 makes the network linear, so central differences are exact up to rounding
        let mut model = net(vec![3], 1.0);
        let batch = frames();
        let upstream = Array1::from(vec![1.0, -0.5, 2.0]);

        let (_, cache) = model.forward_cached(&batch.view()).unwrap();
        let analytic = model.backward(&cache, &upstream.view()).unwrap();
        let params = model.parameters();
        assert_eq!(analytic.len(), params.len());

        let eps = 1e-2;
        for i in 0..params.len() {
            let mut shifted = params.clone();
            shifted[i] += eps;
            model.set_parameters(&shifted).unwrap();
            let plus = weighted_sum(&model, &batch, &upstream);
            shifted[i] -= 2.0 * eps;
            model.set_parameters(&shifted).unwrap();
            let minus = weighted_sum(&model, &batch, &upstream);
            let numeric = (plus - minus) / (2.0 * eps);
            assert_abs_diff_eq!(analytic[i], numeric, epsilon = 2e-3);
        }
    }

    #[test]
    fn leaky_units_pass_scaled_gradient() {
        let model = net(vec![2], 0.1);
        let z = Array2::from_shape_vec((1, 2), vec![-3.0, 2.0]).unwrap();
        assert_eq!(model.leaky_relu(&z), Array2::from_shape_vec((1, 2), vec![-0.3, 2.0]).unwrap());
        assert_eq!(model.leaky_relu_grad(&z), Array2::from_shape_vec((1, 2), vec![0.1, 1.0]).unwrap());
    }

    #[test]
    fn set_parameters_checks_length() {
        let mut model = net(vec![2], 0.01);
        assert!(model.set_parameters(&[0.0; 3]).is_err());
        let params = vec![0.5; model.num_parameters()];
        model.set_parameters(&params).unwrap();
        assert_eq!(model.parameters(), params);
    }

    #[tokio::test]
    async fn save_and_load_reproduce_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reward.params");
        let model = net(vec![8, 4], 0.01);
        model.save(&path).await.unwrap();

        let loaded = RewardNet::load(&path).await.unwrap();
        assert_eq!(loaded, model);
        let sample = frames();
        assert_eq!(
            loaded.score_batch(&sample.view()).unwrap(),
            model.score_batch(&sample.view()).unwrap()
        );
    }

    #[tokio::test]
    async fn load_rejects_truncated_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.params");
        let mut value = serde_json::to_value(net(vec![4], 0.01)).unwrap();
        value["layers"].as_array_mut().unwrap().pop();
        tokio::fs::write(&path, value.to_string()).await.unwrap();

        assert!(RewardNet::load(&path).await.is_err());
    }
}
