//! Learning a reward model end to end from unsorted demonstrations

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use trex_core::{Demonstration, ExecutionContext, RankedDemonstrations, Result};

use crate::checkpoint::CheckpointSink;
use crate::evaluator::{accuracy, predict_traj_return};
use crate::network::{RewardNet, RewardNetConfig};
use crate::sampler::{SamplerConfig, SnippetSampler};
use crate::trainer::{PairwiseRankingTrainer, TrainerConfig, TrainingStats};

/// RNG stream for snippet sampling
pub const SAMPLE_STREAM: u64 = 1;
/// RNG stream for weight initialisation
pub const INIT_STREAM: u64 = 2;

/// Everything needed for one reward-learning run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrexConfig {
    /// Snippet sampling
    pub sampler: SamplerConfig,
    /// Optimisation
    pub trainer: TrainerConfig,
    /// Reward network architecture
    pub network: RewardNetConfig,
    /// Device and seed
    pub context: ExecutionContext,
}

/// Result of [`learn_reward`]
#[derive(Debug, Clone)]
pub struct LearningOutcome {
    /// Trained network, also saved to the output path
    pub model: RewardNet,
    /// Training summary
    pub stats: TrainingStats,
    /// Ranking accuracy on the training pairs
    pub train_accuracy: f64,
    /// `(true, predicted)` return of every demonstration, in ranked order
    pub predicted_returns: Vec<(f64, f64)>,
}

/// Sort, sample, train, save, and report.
pub async fn learn_reward<S>(
    demos: Vec<Demonstration>,
    config: &TrexConfig,
    checkpoint: &S,
    output_path: &Path,
) -> Result<LearningOutcome>
where
    S: CheckpointSink<RewardNet> + ?Sized,
{
    let ranked = RankedDemonstrations::from_unsorted(demos)?;
    info!(lengths = ?ranked.lengths(), "demonstration lengths");
    info!(returns = ?ranked.returns(), "sorted returns");

    let sampler = SnippetSampler::new(config.sampler)?;
    let trainer = PairwiseRankingTrainer::new(config.trainer)?;
    let ctx = &config.context;

    let pairs = sampler.sample(&ranked, &mut ctx.rng_for(SAMPLE_STREAM))?;
    let mut model = RewardNet::new(
        ranked.frame_shape(),
        config.network.clone(),
        &mut ctx.rng_for(INIT_STREAM),
    )?;

    let stats = trainer.train(&mut model, &pairs, ctx, checkpoint).await?;
    model.save(output_path).await?;
    info!(path = %output_path.display(), "saved reward model");

    let mut predicted_returns = Vec::with_capacity(ranked.len());
    for demo in ranked.iter() {
        let predicted = predict_traj_return(&model, &demo.frames())?;
        info!(
            predicted,
            actual = demo.total_return(),
            "predicted vs true return"
        );
        predicted_returns.push((demo.total_return(), predicted));
    }

    let train_accuracy = accuracy(&model, &pairs)?;
    info!(train_accuracy, "training accuracy");

    Ok(LearningOutcome {
        model,
        stats,
        train_accuracy,
        predicted_returns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use trex_core::synthetic::{demonstrations, SyntheticSpec};
    use trex_core::FrameShape;

    use crate::checkpoint::{FileCheckpoint, NoCheckpoint};

    fn config() -> TrexConfig {
        TrexConfig {
            sampler: SamplerConfig {
                num_snippets: 100,
                min_snippet_len: 5,
                max_snippet_len: 10,
            },
            trainer: TrainerConfig {
                num_epochs: 3,
                learning_rate: 1e-2,
                checkpoint_every: 100,
                ..TrainerConfig::default()
            },
            network: RewardNetConfig {
                hidden_dims: vec![8],
                leaky_slope: 0.01,
            },
            context: ExecutionContext::seeded(11),
        }
    }

    fn synthetic(returns: &[f64]) -> Vec<Demonstration> {
        let spec = SyntheticSpec {
            len: 30,
            frame_shape: FrameShape::new(3, 3, 1),
            ..SyntheticSpec::default()
        };
        demonstrations(returns, &spec, &mut StdRng::seed_from_u64(5)).unwrap()
    }

    #[tokio::test]
    async fn learns_ranking_of_synthetic_demonstrations() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reward.params");
        // Deliberately unsorted
        let demos = synthetic(&[9.0, 2.0, 5.0]);

        let outcome = learn_reward(demos, &config(), &NoCheckpoint, &output)
            .await
            .unwrap();

        assert!(outcome.train_accuracy >= 0.9, "accuracy {}", outcome.train_accuracy);
        assert_eq!(outcome.stats.pairs_processed, 300);
        let truths: Vec<f64> = outcome.predicted_returns.iter().map(|p| p.0).collect();
        assert_eq!(truths, vec![2.0, 5.0, 9.0]);
        let predicted: Vec<f64> = outcome.predicted_returns.iter().map(|p| p.1).collect();
        assert!(predicted[0] < predicted[1] && predicted[1] < predicted[2]);
    }

    #[tokio::test]
    async fn saved_model_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reward.params");
        let sink = FileCheckpoint::new(dir.path().join("checkpoint.params"));
        let demos = synthetic(&[1.0, 4.0]);
        let sample = demos[0].clone();

        let outcome = learn_reward(demos, &config(), &sink, &output).await.unwrap();
        let loaded = RewardNet::load(&output).await.unwrap();

        assert_eq!(
            predict_traj_return(&loaded, &sample.frames()).unwrap(),
            predict_traj_return(&outcome.model, &sample.frames()).unwrap()
        );
        assert!(sink.path().exists());
    }

    #[tokio::test]
    async fn invalid_sampler_config_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.sampler.min_snippet_len = 10;
        let result = learn_reward(synthetic(&[1.0, 2.0]), &config, &NoCheckpoint, &dir.path().join("x")).await;
        assert!(result.is_err());
        assert!(!dir.path().join("x").exists());
    }
}
