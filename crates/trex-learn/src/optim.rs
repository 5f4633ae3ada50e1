//! Adam optimiser over flat parameter vectors

use serde::{Deserialize, Serialize};

use trex_core::{Result, TrexError};

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Step size
    pub learning_rate: f32,
    /// First moment decay
    pub beta1: f32,
    /// Second moment decay
    pub beta2: f32,
    /// Denominator stabiliser
    pub epsilon: f32,
    /// L2 penalty added to the gradient
    pub weight_decay: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 5e-5,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
        }
    }
}

/// Adam state: first and second moment estimates and step count
#[derive(Debug, Clone, Default)]
pub struct Adam {
    config: AdamConfig,
    momentum: Vec<f32>,
    velocity: Vec<f32>,
    t: i32,
}

impl Adam {
    /// Create an optimiser; moment buffers are sized on the first step
    #[must_use]
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of steps taken
    #[must_use]
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Apply one update to `params` in place
    pub fn step(&mut self, params: &mut [f32], gradients: &[f32]) -> Result<()> {
        if params.len() != gradients.len() {
            return Err(TrexError::DimensionMismatch {
                expected: vec![params.len()],
                actual: vec![gradients.len()],
            });
        }
        if self.momentum.is_empty() {
            self.momentum = vec![0.0; params.len()];
            self.velocity = vec![0.0; params.len()];
        } else if self.momentum.len() != params.len() {
            return Err(TrexError::DimensionMismatch {
                expected: vec![self.momentum.len()],
                actual: vec![params.len()],
            });
        }

        self.t += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            weight_decay,
        } = self.config;
        let bias1 = 1.0 - beta1.powi(self.t);
        let bias2 = 1.0 - beta2.powi(self.t);

        for i in 0..params.len() {
            let g = gradients[i] + weight_decay * params[i];
            self.momentum[i] = beta1 * self.momentum[i] + (1.0 - beta1) * g;
            self.velocity[i] = beta2 * self.velocity[i] + (1.0 - beta2) * g * g;

            let m_hat = self.momentum[i] / bias1;
            let v_hat = self.velocity[i] / bias2;
            params[i] -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        }

        Ok(())
    }
}
