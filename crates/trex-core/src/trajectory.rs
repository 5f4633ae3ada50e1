//! Demonstrations, snippets and ranked comparison pairs

use std::path::Path;

use ndarray::{s, Array4, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::observation::{stack_frames, Frame, FrameShape};
use crate::{Result, TrexError};

/// A recorded episode: its frames and ground-truth return
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demonstration {
    /// Frames stacked as `T x H x W x C`
    frames: Array4<f32>,
    /// Ground-truth return of the whole episode
    #[serde(rename = "return")]
    total_return: f64,
    /// Per-step rewards, when the collector recorded them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rewards: Option<Vec<f64>>,
}

impl Demonstration {
    /// Create a demonstration from already stacked frames
    #[must_use]
    pub fn new(frames: Array4<f32>, total_return: f64) -> Self {
        Self {
            frames,
            total_return,
            rewards: None,
        }
    }

    /// Create a demonstration from individual frames, which must share one shape
    pub fn from_frames(frames: &[Frame], total_return: f64) -> Result<Self> {
        Ok(Self::new(stack_frames(frames)?, total_return))
    }

    /// Attach the per-step reward sequence
    pub fn with_rewards(mut self, rewards: Vec<f64>) -> Result<Self> {
        if rewards.len() != self.len() {
            return Err(TrexError::DimensionMismatch {
                expected: vec![self.len()],
                actual: vec![rewards.len()],
            });
        }
        self.rewards = Some(rewards);
        Ok(self)
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len_of(ndarray::Axis(0))
    }

    /// Check if the demonstration has no frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ground-truth return
    #[must_use]
    pub fn total_return(&self) -> f64 {
        self.total_return
    }

    /// Per-step rewards, if recorded
    #[must_use]
    pub fn rewards(&self) -> Option<&[f64]> {
        self.rewards.as_deref()
    }

    /// All frames
    #[must_use]
    pub fn frames(&self) -> ArrayView4<'_, f32> {
        self.frames.view()
    }

    /// Shape of every frame in this demonstration
    #[must_use]
    pub fn frame_shape(&self) -> FrameShape {
        FrameShape::of_batch(&self.frames.view())
    }

    /// Contiguous run of `len` frames starting at `start`
    pub fn window(&self, start: usize, len: usize) -> Result<ArrayView4<'_, f32>> {
        let end = start + len;
        if end > self.len() {
            return Err(TrexError::InsufficientData {
                needed: end,
                actual: self.len(),
            });
        }
        Ok(self.frames.slice(s![start..end, .., .., ..]))
    }

    /// Load a demonstration written by [`Demonstration::save`]
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let demo: Self = serde_json::from_str(&json)?;
        if let Some(rewards) = &demo.rewards {
            if rewards.len() != demo.len() {
                return Err(TrexError::DimensionMismatch {
                    expected: vec![demo.len()],
                    actual: vec![rewards.len()],
                });
            }
        }
        tracing::debug!(path = %path.display(), frames = demo.len(), "loaded demonstration");
        Ok(demo)
    }

    /// Persist the demonstration as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Demonstrations sorted ascending by ground-truth return.
///
/// Snippet sampling relies on a later index meaning an equal or better
/// demonstration, so the ordering lives in the type.
#[derive(Debug, Clone)]
pub struct RankedDemonstrations {
    demos: Vec<Demonstration>,
    frame_shape: FrameShape,
}

impl RankedDemonstrations {
    /// Sort demonstrations by return
    pub fn from_unsorted(mut demos: Vec<Demonstration>) -> Result<Self> {
        Self::check_returns(&demos)?;
        demos.sort_by(|a, b| a.total_return.total_cmp(&b.total_return));
        Self::build(demos)
    }

    /// Accept demonstrations that are already sorted, failing on the first out-of-order one
    pub fn try_from_sorted(demos: Vec<Demonstration>) -> Result<Self> {
        Self::check_returns(&demos)?;
        for (index, pair) in demos.windows(2).enumerate() {
            if pair[1].total_return < pair[0].total_return {
                return Err(TrexError::Unsorted {
                    index: index + 1,
                    previous: pair[0].total_return,
                    value: pair[1].total_return,
                });
            }
        }
        Self::build(demos)
    }

    fn check_returns(demos: &[Demonstration]) -> Result<()> {
        match demos.iter().position(|d| !d.total_return.is_finite()) {
            Some(i) => Err(TrexError::Config(format!(
                "demonstration {i} has non-finite return {}",
                demos[i].total_return
            ))),
            None => Ok(()),
        }
    }

    fn build(demos: Vec<Demonstration>) -> Result<Self> {
        let frame_shape = demos
            .first()
            .ok_or(TrexError::InsufficientData {
                needed: 1,
                actual: 0,
            })?
            .frame_shape();

        for demo in &demos {
            let actual = demo.frame_shape();
            if actual != frame_shape {
                return Err(TrexError::DimensionMismatch {
                    expected: frame_shape.to_vec(),
                    actual: actual.to_vec(),
                });
            }
        }

        Ok(Self { demos, frame_shape })
    }

    /// Number of demonstrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.demos.len()
    }

    /// Always false; construction rejects empty input
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.demos.is_empty()
    }

    /// Demonstration at a rank
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Demonstration> {
        self.demos.get(index)
    }

    /// Iterate from worst to best
    pub fn iter(&self) -> std::slice::Iter<'_, Demonstration> {
        self.demos.iter()
    }

    /// Shared frame shape
    #[must_use]
    pub fn frame_shape(&self) -> FrameShape {
        self.frame_shape
    }

    /// Ground-truth returns in rank order
    #[must_use]
    pub fn returns(&self) -> Vec<f64> {
        self.demos.iter().map(Demonstration::total_return).collect()
    }

    /// Frame counts in rank order
    #[must_use]
    pub fn lengths(&self) -> Vec<usize> {
        self.demos.iter().map(Demonstration::len).collect()
    }

    /// Give back the sorted demonstrations
    #[must_use]
    pub fn into_inner(self) -> Vec<Demonstration> {
        self.demos
    }
}

impl std::ops::Index<usize> for RankedDemonstrations {
    type Output = Demonstration;

    fn index(&self, index: usize) -> &Self::Output {
        &self.demos[index]
    }
}

/// Contiguous piece of a demonstration
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Rank of the source demonstration
    pub source: usize,
    /// Index of the first frame in the source
    pub start: usize,
    /// Copied frames, `len x H x W x C`
    pub frames: Array4<f32>,
}

impl Snippet {
    /// Copy `len` frames of `demos[source]` starting at `start`
    pub fn extract(
        demos: &RankedDemonstrations,
        source: usize,
        start: usize,
        len: usize,
    ) -> Result<Self> {
        let demo = demos.get(source).ok_or(TrexError::InsufficientData {
            needed: source + 1,
            actual: demos.len(),
        })?;
        Ok(Self {
            source,
            start,
            frames: demo.window(start, len)?.to_owned(),
        })
    }

    /// Number of frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len_of(ndarray::Axis(0))
    }

    /// Check if the snippet has no frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame shape
    #[must_use]
    pub fn frame_shape(&self) -> FrameShape {
        FrameShape::of_batch(&self.frames.view())
    }
}

/// Two snippets and which position holds the better one.
///
/// `label == 1` means position 1 comes from the higher-return demonstration,
/// `label == 0` means position 0 does.
#[derive(Debug, Clone)]
pub struct TrainingPair {
    snippets: [Snippet; 2],
    label: usize,
}

impl TrainingPair {
    /// Create a labelled pair
    pub fn new(first: Snippet, second: Snippet, label: usize) -> Result<Self> {
        if label > 1 {
            return Err(TrexError::InvalidField {
                field: "label".to_string(),
                value: label.to_string(),
            });
        }
        Ok(Self {
            snippets: [first, second],
            label,
        })
    }

    /// Snippet at position 0 or 1
    #[must_use]
    pub fn snippet(&self, position: usize) -> &Snippet {
        &self.snippets[position]
    }

    /// Both snippets in positional order
    #[must_use]
    pub fn snippets(&self) -> &[Snippet; 2] {
        &self.snippets
    }

    /// Position of the better snippet
    #[must_use]
    pub fn label(&self) -> usize {
        self.label
    }

    /// Snippet from the higher-return demonstration
    #[must_use]
    pub fn preferred(&self) -> &Snippet {
        &self.snippets[self.label]
    }

    /// Snippet from the lower-return demonstration
    #[must_use]
    pub fn rejected(&self) -> &Snippet {
        &self.snippets[1 - self.label]
    }

    /// Same comparison with positions exchanged and the label flipped
    #[must_use]
    pub fn swapped(&self) -> Self {
        let [a, b] = self.snippets.clone();
        Self {
            snippets: [b, a],
            label: 1 - self.label,
        }
    }
}
