//! Learning reward functions from ranked demonstrations
//!
//! This crate provides the learning half of T-REX:
//! - Snippet-pair sampling under the return ordering
//! - An MLP reward network with manual backpropagation
//! - Pairwise ranking training with Adam and checkpointing
//! - Accuracy and predicted-return evaluation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checkpoint;
pub mod evaluator;
pub mod network;
pub mod optim;
pub mod pipeline;
pub mod sampler;
pub mod trainer;

// Re-export learning components
pub use network::{ForwardCache, RewardNet, RewardNetConfig, Trainable};
pub use sampler::{SamplerConfig, SnippetSampler};
pub use trainer::{PairwiseRankingTrainer, TrainerConfig, TrainingStats};

// Re-export utilities
pub use checkpoint::{CheckpointSink, FileCheckpoint, NoCheckpoint};
pub use evaluator::{accuracy, predict_reward_sequence, predict_traj_return};
pub use optim::{Adam, AdamConfig};
pub use pipeline::{learn_reward, LearningOutcome, TrexConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        learn_reward, PairwiseRankingTrainer, RewardNet, RewardNetConfig, SamplerConfig,
        SnippetSampler, TrainerConfig, TrexConfig,
    };
    pub use trex_core::prelude::*;
}
