//! Destinations for periodic parameter snapshots during training

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use trex_core::Result;

use crate::network::RewardNet;

/// Receives the model at checkpoint boundaries
#[async_trait]
pub trait CheckpointSink<M: ?Sized + Sync>: Send + Sync {
    /// Persist the current parameters
    async fn save(&self, model: &M) -> Result<()>;
}

/// Overwrites one parameter file at every checkpoint
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    /// Checkpoint to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointSink<RewardNet> for FileCheckpoint {
    async fn save(&self, model: &RewardNet) -> Result<()> {
        // Write beside the target and rename so readers never see a partial file
        let staging = self.path.with_extension("partial");
        model.save(&staging).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

/// Discards checkpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckpoint;

#[async_trait]
impl<M: ?Sized + Sync> CheckpointSink<M> for NoCheckpoint {
    async fn save(&self, _model: &M) -> Result<()> {
        Ok(())
    }
}
