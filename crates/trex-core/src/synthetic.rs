//! Synthetic demonstrations for tests and demos
//!
//! Every frame of a demonstration is filled with an intensity proportional
//! to the demonstration's return plus Gaussian pixel noise, so a linear
//! scorer over pixels can recover the ranking.

use ndarray::Array4;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::observation::FrameShape;
use crate::trajectory::Demonstration;
use crate::{Result, TrexError};

/// Parameters of the synthetic generator
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSpec {
    /// Frames per demonstration
    pub len: usize,
    /// Shape of each frame
    pub frame_shape: FrameShape,
    /// Intensity per unit of return
    pub scale: f32,
    /// Standard deviation of pixel noise
    pub noise_std: f32,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            len: 40,
            frame_shape: FrameShape::new(4, 4, 3),
            scale: 0.1,
            noise_std: 0.01,
        }
    }
}

/// One demonstration per return, in the given order
pub fn demonstrations<R: Rng + ?Sized>(
    returns: &[f64],
    spec: &SyntheticSpec,
    rng: &mut R,
) -> Result<Vec<Demonstration>> {
    let noise = Normal::new(0.0_f32, spec.noise_std)
        .map_err(|e| TrexError::Config(format!("noise_std: {e}")))?;
    let FrameShape {
        height,
        width,
        channels,
    } = spec.frame_shape;

    returns
        .iter()
        .map(|&ret| {
            let base = ret as f32 * spec.scale;
            let frames = Array4::from_shape_fn((spec.len, height, width, channels), |_| {
                base + noise.sample(rng)
            });
            let per_step = ret / spec.len.max(1) as f64;
            Demonstration::new(frames, ret).with_rewards(vec![per_step; spec.len])
        })
        .collect()
}
