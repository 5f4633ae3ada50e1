//! Pairwise ranking training
//!
//! Each pair is a two-way classification: the logits are the predicted
//! returns of the two snippets and the target is the position of the snippet
//! from the better demonstration. An L1 term on the per-frame scores keeps
//! reward magnitudes from growing without bound.

use ndarray::Array1;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use trex_core::{
    CumulativeReturn, ExecutionContext, Result, RewardModel, TrainingPair, TrexError,
};

use crate::checkpoint::CheckpointSink;
use crate::network::Trainable;
use crate::optim::{Adam, AdamConfig};

/// RNG stream used to shuffle pairs between epochs
pub const SHUFFLE_STREAM: u64 = 3;

/// Trainer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Passes over the full pair set
    pub num_epochs: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// Adam L2 weight decay
    pub weight_decay: f32,
    /// Weight of the summed absolute frame scores in the loss
    pub l1_coefficient: f32,
    /// Pairs between checkpoints, counted across epochs
    pub checkpoint_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_epochs: 5,
            learning_rate: 5e-5,
            weight_decay: 0.0,
            l1_coefficient: 0.0,
            checkpoint_every: 1000,
        }
    }
}

/// Summary of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Gradient steps taken
    pub pairs_processed: usize,
    /// Mean loss of every epoch
    pub epoch_losses: Vec<f64>,
    /// Checkpoints handed to the sink successfully
    pub checkpoints_written: usize,
    /// Checkpoints the sink failed to persist
    pub checkpoint_failures: usize,
}

/// Loss of one pair and the gradient of that loss w.r.t. each frame score
#[derive(Debug, Clone)]
pub struct PairLoss {
    /// Cross-entropy plus magnitude penalty
    pub loss: f64,
    /// Magnitude penalty alone
    pub penalty: f64,
    /// dLoss/dScore for the frames of each snippet
    pub score_grads: [Array1<f32>; 2],
}

/// Cross-entropy on `[R0, R1]` plus `l1_coefficient * (|r|_0 + |r|_1)`
pub fn pair_loss(scores: [&Array1<f32>; 2], label: usize, l1_coefficient: f32) -> Result<PairLoss> {
    let returns = scores.map(|s| CumulativeReturn::from_scores(s.iter().copied()));
    let logits = [returns[0].sum, returns[1].sum];

    let max = logits[0].max(logits[1]);
    let log_sum_exp = max + ((logits[0] - max).exp() + (logits[1] - max).exp()).ln();
    let cross_entropy = log_sum_exp - logits[label];
    let penalty = f64::from(l1_coefficient) * (returns[0].sum_abs + returns[1].sum_abs);
    let loss = cross_entropy + penalty;

    if !loss.is_finite() {
        return Err(TrexError::Computation(format!(
            "non-finite loss (logits {logits:?}, penalty {penalty})"
        )));
    }

    let score_grads = [0, 1].map(|k| {
        let target = if k == label { 1.0 } else { 0.0 };
        let softmax_grad = ((logits[k] - log_sum_exp).exp() - target) as f32;
        scores[k].mapv(|r| {
            let sign = if r > 0.0 {
                1.0
            } else if r < 0.0 {
                -1.0
            } else {
                0.0
            };
            softmax_grad + l1_coefficient * sign
        })
    });

    Ok(PairLoss {
        loss,
        penalty,
        score_grads,
    })
}

/// Trains a reward model on labelled snippet pairs
#[derive(Debug, Clone)]
pub struct PairwiseRankingTrainer {
    config: TrainerConfig,
}

impl PairwiseRankingTrainer {
    /// Create a trainer
    pub fn new(config: TrainerConfig) -> Result<Self> {
        if !(config.learning_rate > 0.0) {
            return Err(TrexError::Config(format!(
                "learning_rate must be positive, got {}",
                config.learning_rate
            )));
        }
        if config.weight_decay < 0.0 || config.l1_coefficient < 0.0 {
            return Err(TrexError::Config(
                "weight_decay and l1_coefficient must be non-negative".to_string(),
            ));
        }
        if config.checkpoint_every == 0 {
            return Err(TrexError::Config(
                "checkpoint_every must be at least 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Trainer configuration
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train `model` in place.
    ///
    /// Every pair is checked against the model's frame shape before the first
    /// step, so a malformed pair fails the run without touching parameters.
    /// Checkpoint failures are logged and counted but do not stop training.
    pub async fn train<M, S>(
        &self,
        model: &mut M,
        pairs: &[TrainingPair],
        ctx: &ExecutionContext,
        checkpoint: &S,
    ) -> Result<TrainingStats>
    where
        M: Trainable,
        S: CheckpointSink<M> + ?Sized,
    {
        Self::check_pairs(model, pairs)?;
        debug!(device = ?ctx.device, seed = ?ctx.seed, "training context");

        let mut optimizer = Adam::new(AdamConfig {
            learning_rate: self.config.learning_rate,
            weight_decay: self.config.weight_decay,
            ..AdamConfig::default()
        });
        let mut rng = ctx.rng_for(SHUFFLE_STREAM);
        let mut order: Vec<usize> = (0..pairs.len()).collect();
        let mut stats = TrainingStats::default();
        let mut window_loss = 0.0;

        info!(
            pairs = pairs.len(),
            epochs = self.config.num_epochs,
            "training reward model"
        );

        for epoch in 0..self.config.num_epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for (i, &idx) in order.iter().enumerate() {
                let step = self.step(model, &mut optimizer, &pairs[idx])?;
                epoch_loss += step.loss;
                window_loss += step.loss;
                stats.pairs_processed += 1;
                metrics::increment_counter!("trex_pairs_processed_total");

                if stats.pairs_processed % self.config.checkpoint_every == 0 {
                    info!(
                        epoch,
                        step = i,
                        loss = window_loss,
                        magnitude_penalty = step.penalty,
                        "checkpointing"
                    );
                    metrics::gauge!("trex_window_loss", window_loss);
                    metrics::gauge!("trex_magnitude_penalty", step.penalty);
                    window_loss = 0.0;

                    match checkpoint.save(model).await {
                        Ok(()) => stats.checkpoints_written += 1,
                        Err(e) => {
                            warn!(error = %e, "checkpoint failed, continuing");
                            stats.checkpoint_failures += 1;
                        }
                    }
                }
            }

            let mean_loss = if pairs.is_empty() {
                0.0
            } else {
                epoch_loss / pairs.len() as f64
            };
            debug!(epoch, mean_loss, "epoch finished");
            stats.epoch_losses.push(mean_loss);
        }

        info!(pairs_processed = stats.pairs_processed, "finished training");
        Ok(stats)
    }

    fn check_pairs<M: RewardModel>(model: &M, pairs: &[TrainingPair]) -> Result<()> {
        let expected = model.frame_shape();
        for (i, pair) in pairs.iter().enumerate() {
            for snippet in pair.snippets() {
                expected
                    .ensure_batch(&snippet.frames.view())
                    .map_err(|e| e.for_entry(format!("pair {i}")))?;
            }
        }
        Ok(())
    }

    fn step<M: Trainable>(
        &self,
        model: &mut M,
        optimizer: &mut Adam,
        pair: &TrainingPair,
    ) -> Result<PairLoss> {
        let (scores_0, cache_0) = model.forward_cached(&pair.snippet(0).frames.view())?;
        let (scores_1, cache_1) = model.forward_cached(&pair.snippet(1).frames.view())?;

        let result = pair_loss([&scores_0, &scores_1], pair.label(), self.config.l1_coefficient)?;

        let mut gradient = model.backward(&cache_0, &result.score_grads[0].view())?;
        let gradient_1 = model.backward(&cache_1, &result.score_grads[1].view())?;
        for (g, g1) in gradient.iter_mut().zip(&gradient_1) {
            *g += g1;
        }

        let mut params = model.parameters();
        optimizer.step(&mut params, &gradient)?;
        model.set_parameters(&params)?;

        Ok(result)
    }
}
