//! Core types for learning reward functions from ranked demonstrations
//!
//! This crate holds the data model shared by the learning and evaluation
//! crates: demonstrations and their return ordering, snippets and labelled
//! comparison pairs, the per-frame reward model abstraction, and the error
//! type used throughout.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod observation;
pub mod reward;
pub mod synthetic;
pub mod trajectory;

// Re-export core traits and types
pub use context::{Device, ExecutionContext};
pub use error::{Result, TrexError};
pub use observation::{stack_frames, Frame, FrameShape};
pub use reward::{CumulativeReturn, RewardModel};
pub use trajectory::{Demonstration, RankedDemonstrations, Snippet, TrainingPair};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CumulativeReturn, Demonstration, ExecutionContext, Frame, FrameShape,
        RankedDemonstrations, Result, RewardModel, Snippet, TrainingPair, TrexError,
    };
}
