//! Snippet-pair sampling from ranked demonstrations
//!
//! Each pair takes equal-length snippets from two different demonstrations.
//! The snippet of the better demonstration never starts earlier than the
//! snippet of the worse one, which encodes the prior that later progress in
//! a better episode is at least as good.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use trex_core::{RankedDemonstrations, Result, Snippet, TrainingPair, TrexError};

/// Sampling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of pairs to draw
    pub num_snippets: usize,
    /// Shortest snippet length (inclusive)
    pub min_snippet_len: usize,
    /// Longest snippet length (exclusive)
    pub max_snippet_len: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            num_snippets: 6000,
            min_snippet_len: 20,
            max_snippet_len: 100,
        }
    }
}

/// Draws labelled snippet pairs
#[derive(Debug, Clone)]
pub struct SnippetSampler {
    config: SamplerConfig,
}

impl SnippetSampler {
    /// Create a sampler, rejecting empty or inverted length bounds
    pub fn new(config: SamplerConfig) -> Result<Self> {
        if config.min_snippet_len == 0 {
            return Err(TrexError::Config(
                "min_snippet_len must be at least 1".to_string(),
            ));
        }
        if config.min_snippet_len >= config.max_snippet_len {
            return Err(TrexError::Config(format!(
                "min_snippet_len ({}) must be below max_snippet_len ({})",
                config.min_snippet_len, config.max_snippet_len
            )));
        }
        Ok(Self { config })
    }

    /// Sampling configuration
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draw `num_snippets` pairs
    pub fn sample<R: Rng + ?Sized>(
        &self,
        demos: &RankedDemonstrations,
        rng: &mut R,
    ) -> Result<Vec<TrainingPair>> {
        self.validate(demos)?;

        let lengths = demos.lengths();
        info!(
            demos = demos.len(),
            min_demo_len = lengths.iter().min().copied().unwrap_or(0),
            max_demo_len = lengths.iter().max().copied().unwrap_or(0),
            "sampling {} snippet pairs",
            self.config.num_snippets
        );

        let mut pairs = Vec::with_capacity(self.config.num_snippets);
        let mut longest = 0;
        for _ in 0..self.config.num_snippets {
            let pair = self.sample_pair(demos, rng)?;
            longest = longest.max(pair.snippet(0).len());
            pairs.push(pair);
        }

        debug!(longest_snippet = longest, pairs = pairs.len(), "sampling finished");
        Ok(pairs)
    }

    fn validate(&self, demos: &RankedDemonstrations) -> Result<()> {
        if demos.len() < 2 {
            return Err(TrexError::InsufficientData {
                needed: 2,
                actual: demos.len(),
            });
        }
        // A demo of exactly min_snippet_len frames leaves [min, min) empty
        if let Some((i, demo)) = demos
            .iter()
            .enumerate()
            .find(|(_, d)| d.len() <= self.config.min_snippet_len)
        {
            return Err(TrexError::Config(format!(
                "demonstration {i} has {} frames, needs more than min_snippet_len ({})",
                demo.len(),
                self.config.min_snippet_len
            )));
        }
        Ok(())
    }

    fn sample_pair<R: Rng + ?Sized>(
        &self,
        demos: &RankedDemonstrations,
        rng: &mut R,
    ) -> Result<TrainingPair> {
        let mut chosen = index::sample(rng, demos.len(), 2).into_vec();
        chosen.sort_unstable();
        let (ti, tj) = (chosen[0], chosen[1]);

        let len_i = demos[ti].len();
        let len_j = demos[tj].len();
        let min_length = len_i.min(len_j);
        let max_length = min_length.min(self.config.max_snippet_len);
        let length = rng.gen_range(self.config.min_snippet_len..max_length);

        let ti_start = rng.gen_range(0..=min_length - length);
        let tj_start = rng.gen_range(ti_start..=len_j - length);

        let worse = Snippet::extract(demos, ti, ti_start, length)?;
        let better = Snippet::extract(demos, tj, tj_start, length)?;

        if rng.gen_bool(0.5) {
            TrainingPair::new(worse, better, 1)
        } else {
            TrainingPair::new(better, worse, 0)
        }
    }
}
