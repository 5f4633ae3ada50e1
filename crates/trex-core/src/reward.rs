//! Learned per-frame reward models

use ndarray::{Array1, ArrayView3, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::observation::FrameShape;
use crate::{Result, TrexError};

/// Sum of per-frame scores over a sequence, and the sum of their magnitudes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeReturn {
    /// Sum of scores
    pub sum: f64,
    /// Sum of absolute scores
    pub sum_abs: f64,
}

impl CumulativeReturn {
    /// Accumulate a sequence of per-frame scores
    #[must_use]
    pub fn from_scores<I: IntoIterator<Item = f32>>(scores: I) -> Self {
        scores.into_iter().fold(Self::default(), |acc, r| Self {
            sum: acc.sum + f64::from(r),
            sum_abs: acc.sum_abs + f64::from(r.abs()),
        })
    }
}

/// A function scoring single observation frames.
///
/// Frames are scored independently: the return of a sequence is the sum of
/// its frame scores and never depends on frame order or history.
pub trait RewardModel: Send + Sync {
    /// Shape of the frames this model accepts
    fn frame_shape(&self) -> FrameShape;

    /// Score every frame of a `T x H x W x C` batch
    fn score_batch(&self, frames: &ArrayView4<f32>) -> Result<Array1<f32>>;

    /// Score a single frame
    fn score(&self, frame: &ArrayView3<f32>) -> Result<f64> {
        let batch = frame.clone().insert_axis(Axis(0));
        let scores = self.score_batch(&batch)?;
        scores
            .get(0)
            .copied()
            .map(f64::from)
            .ok_or_else(|| TrexError::Computation("model returned no score".to_string()))
    }

    /// Cumulative return of a sequence of frames
    fn cumulative_return(&self, frames: &ArrayView4<f32>) -> Result<CumulativeReturn> {
        let scores = self.score_batch(frames)?;
        Ok(CumulativeReturn::from_scores(scores.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    /// Scores a frame by the sum of its pixels
    struct PixelSum(FrameShape);

    impl RewardModel for PixelSum {
        fn frame_shape(&self) -> FrameShape {
            self.0
        }

        fn score_batch(&self, frames: &ArrayView4<f32>) -> Result<Array1<f32>> {
            self.0.ensure_batch(frames)?;
            Ok(frames
                .outer_iter()
                .map(|frame| frame.sum())
                .collect())
        }
    }

    #[test]
    fn cumulative_return_sums_frames() {
        let model = PixelSum(FrameShape::new(1, 2, 1));
        let mut frames = Array4::<f32>::zeros((3, 1, 2, 1));
        frames[[0, 0, 0, 0]] = 1.0;
        frames[[1, 0, 1, 0]] = -2.0;
        frames[[2, 0, 0, 0]] = 0.5;

        let ret = model.cumulative_return(&frames.view()).unwrap();
        assert_eq!(ret.sum, -0.5);
        assert_eq!(ret.sum_abs, 3.5);
        assert_eq!(model.score(&frames.index_axis(Axis(0), 1)).unwrap(), -2.0);
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let model = PixelSum(FrameShape::new(1, 2, 1));
        let frames = Array4::<f32>::zeros((3, 2, 2, 1));
        assert!(model.cumulative_return(&frames.view()).is_err());
    }
}
