//! Observation frames and frame shapes

use ndarray::{Array3, Array4, ArrayView3, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::{Result, TrexError};

/// A single image observation laid out as height x width x channels
pub type Frame = Array3<f32>;

/// Shape of a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    /// Height of the image
    pub height: usize,
    /// Width of the image
    pub width: usize,
    /// Number of channels
    pub channels: usize,
}

impl FrameShape {
    /// Create a new frame shape
    #[must_use]
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Shape of a single frame
    #[must_use]
    pub fn of_frame(frame: &ArrayView3<f32>) -> Self {
        let (height, width, channels) = frame.dim();
        Self::new(height, width, channels)
    }

    /// Per-frame shape of a `T x H x W x C` batch
    #[must_use]
    pub fn of_batch(frames: &ArrayView4<f32>) -> Self {
        let (_, height, width, channels) = frames.dim();
        Self::new(height, width, channels)
    }

    /// Number of scalar features in one frame
    #[must_use]
    pub fn size(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Shape as a vector, for error reporting
    #[must_use]
    pub fn to_vec(&self) -> Vec<usize> {
        vec![self.height, self.width, self.channels]
    }

    /// Check that every frame of a batch has this shape
    pub fn ensure_batch(&self, frames: &ArrayView4<f32>) -> Result<()> {
        let actual = Self::of_batch(frames);
        if actual == *self {
            Ok(())
        } else {
            Err(TrexError::DimensionMismatch {
                expected: self.to_vec(),
                actual: actual.to_vec(),
            })
        }
    }
}

/// Stack individual frames into one `T x H x W x C` array.
///
/// All frames must share the shape of the first one.
pub fn stack_frames(frames: &[Frame]) -> Result<Array4<f32>> {
    let first = frames.first().ok_or(TrexError::InsufficientData {
        needed: 1,
        actual: 0,
    })?;
    let shape = FrameShape::of_frame(&first.view());

    for frame in frames {
        let actual = FrameShape::of_frame(&frame.view());
        if actual != shape {
            return Err(TrexError::DimensionMismatch {
                expected: shape.to_vec(),
                actual: actual.to_vec(),
            });
        }
    }

    let views: Vec<ArrayView3<f32>> = frames.iter().map(Array3::view).collect();
    ndarray::stack(Axis(0), &views).map_err(|e| TrexError::Computation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_frames_of_equal_shape() {
        let frames = vec![Frame::zeros((2, 3, 1)), Frame::ones((2, 3, 1))];
        let stacked = stack_frames(&frames).unwrap();
        assert_eq!(stacked.dim(), (2, 2, 3, 1));
        assert_eq!(FrameShape::of_batch(&stacked.view()), FrameShape::new(2, 3, 1));
    }

    #[test]
    fn rejects_mixed_shapes() {
        let frames = vec![Frame::zeros((2, 3, 1)), Frame::zeros((3, 2, 1))];
        let err = stack_frames(&frames).unwrap_err();
        assert!(matches!(err, TrexError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            stack_frames(&[]),
            Err(TrexError::InsufficientData { needed: 1, actual: 0 })
        ));
    }
}
