//! Scoring trained reward models

use ndarray::ArrayView4;

use trex_core::{Result, RewardModel, TrainingPair, TrexError};

/// Fraction of pairs where the labelled snippet gets the strictly higher
/// predicted return. A tie counts as a miss.
pub fn accuracy<M: RewardModel + ?Sized>(model: &M, pairs: &[TrainingPair]) -> Result<f64> {
    if pairs.is_empty() {
        return Err(TrexError::InsufficientData {
            needed: 1,
            actual: 0,
        });
    }

    let mut correct = 0usize;
    for (i, pair) in pairs.iter().enumerate() {
        let returns = [0, 1].map(|k| model.cumulative_return(&pair.snippet(k).frames.view()));
        let [r0, r1] = returns;
        let r0 = r0.map_err(|e| e.for_entry(format!("pair {i}")))?.sum;
        let r1 = r1.map_err(|e| e.for_entry(format!("pair {i}")))?.sum;

        let predicted = if r1 > r0 {
            Some(1)
        } else if r0 > r1 {
            Some(0)
        } else {
            None
        };
        if predicted == Some(pair.label()) {
            correct += 1;
        }
    }

    Ok(correct as f64 / pairs.len() as f64)
}

/// Per-frame predicted reward along a trajectory
pub fn predict_reward_sequence<M: RewardModel + ?Sized>(
    model: &M,
    frames: &ArrayView4<f32>,
) -> Result<Vec<f64>> {
    if frames.shape()[0] == 0 {
        return Ok(Vec::new());
    }
    let scores = model.score_batch(frames)?;
    Ok(scores.iter().map(|&s| f64::from(s)).collect())
}

/// Sum of the per-frame predicted rewards
pub fn predict_traj_return<M: RewardModel + ?Sized>(
    model: &M,
    frames: &ArrayView4<f32>,
) -> Result<f64> {
    Ok(predict_reward_sequence(model, frames)?.iter().sum())
}
