//! Example: learning a reward function from synthetic ranked demonstrations
//!
//! Pass a JSON `TrexConfig` path as the first argument to override the
//! built-in settings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;

use trex_core::synthetic::{demonstrations, SyntheticSpec};
use trex_core::{config, logging, ExecutionContext};
use trex_learn::{
    learn_reward, FileCheckpoint, RewardNetConfig, SamplerConfig, TrainerConfig, TrexConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => config::load_json::<TrexConfig>(Path::new(&path))
            .await
            .with_context(|| format!("loading config from {path}"))?,
        None => TrexConfig {
            sampler: SamplerConfig {
                num_snippets: 500,
                min_snippet_len: 5,
                max_snippet_len: 15,
            },
            trainer: TrainerConfig {
                num_epochs: 3,
                learning_rate: 1e-3,
                checkpoint_every: 250,
                ..TrainerConfig::default()
            },
            network: RewardNetConfig {
                hidden_dims: vec![16],
                ..RewardNetConfig::default()
            },
            context: ExecutionContext::seeded(0),
        },
    };

    let mut rng = StdRng::seed_from_u64(config.context.seed.unwrap_or(0));
    let returns = [7.0, 1.0, 12.0, 4.0, 9.0];
    let demos = demonstrations(&returns, &SyntheticSpec::default(), &mut rng)?;

    let out_dir = std::env::temp_dir().join("trex-demo");
    tokio::fs::create_dir_all(&out_dir).await?;
    let output: PathBuf = out_dir.join("reward.params");
    let checkpoint = FileCheckpoint::new(out_dir.join("checkpoint.params"));

    let outcome = learn_reward(demos, &config, &checkpoint, &output).await?;

    println!("\nResults:");
    for (actual, predicted) in &outcome.predicted_returns {
        println!("  true return {actual:6.2}  predicted {predicted:10.4}");
    }
    println!("  Training accuracy: {:.3}", outcome.train_accuracy);
    println!("  Pairs processed: {}", outcome.stats.pairs_processed);
    println!("  Parameters saved to {}", output.display());

    Ok(())
}
