//! Correlating predicted returns of learned reward models with ground truth

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use trex_core::{Demonstration, ExecutionContext, FrameShape, Result, TrexError};
use trex_learn::{predict_traj_return, RewardNet};

use crate::catalog::{Catalog, CatalogEntry, Constraints};
use crate::report::{CatalogKind, CorrelationReport, RunManifest, SkippedEntry};
use crate::stats::{pearson, spearman};

/// Analyzer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Stop loading demonstrations once this many are loaded
    pub max_demo_set_size: usize,
    /// Use trajectory length in place of the model's predicted return
    pub baseline_reward: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_demo_set_size: 200,
            baseline_reward: false,
        }
    }
}

/// Computes Pearson and Spearman correlation per reward model
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    config: AnalyzerConfig,
}

impl CorrelationAnalyzer {
    /// Create an analyzer
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        if config.max_demo_set_size < 2 {
            return Err(TrexError::Config(format!(
                "max_demo_set_size must be at least 2, got {}",
                config.max_demo_set_size
            )));
        }
        Ok(Self { config })
    }

    /// Analyzer settings
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Correlate every model passing `model_constraints` against the
    /// demonstrations passing `demo_constraints`.
    ///
    /// Rows with missing or malformed fields, unreadable files, or models whose
    /// correlation is undefined are skipped and listed in the report. Fewer than
    /// two usable demonstrations, or demonstrations that all share one return,
    /// fail the whole run.
    pub async fn compute(
        &self,
        models: &Catalog,
        demos: &Catalog,
        model_constraints: &Constraints,
        demo_constraints: &Constraints,
        ctx: &ExecutionContext,
    ) -> Result<CorrelationReport> {
        info!(
            ?model_constraints,
            ?demo_constraints,
            device = ?ctx.device,
            "calculating correlations of reward models"
        );
        let mut report = CorrelationReport::default();

        let model_rows = select(models, model_constraints, CatalogKind::Model, &mut report.skipped);
        info!("evaluating {} reward models", model_rows.len());

        let demonstrations = self
            .load_demonstrations(demos, demo_constraints, &mut report.skipped)
            .await;
        report.demos_used = demonstrations.len();
        info!("using {} demonstrations", demonstrations.len());

        if demonstrations.len() < 2 {
            return Err(TrexError::UndefinedCorrelation(format!(
                "need at least 2 demonstrations, loaded {}",
                demonstrations.len()
            )));
        }
        let truths: Vec<f64> = demonstrations.iter().map(Demonstration::total_return).collect();
        if truths.iter().all(|&r| r == truths[0]) {
            return Err(TrexError::UndefinedCorrelation(
                "every demonstration has the same return".to_string(),
            ));
        }

        for (i, (row, entry)) in model_rows.iter().enumerate() {
            let result = self
                .correlate(models, entry, &demonstrations, &truths, i, model_rows.len())
                .await;
            match result {
                Ok((id, corr)) => {
                    debug!(id = %id, pearson = corr.0, spearman = corr.1, "correlation");
                    report.correlations.insert(id, corr);
                }
                Err(e) => skip(&mut report.skipped, CatalogKind::Model, *row, entry, &e),
            }
        }

        Ok(report)
    }

    /// Run [`CorrelationAnalyzer::compute`] and write the report and a manifest
    /// under `log_dir`, named by a fresh run id.
    pub async fn run(
        &self,
        models: &Catalog,
        demos: &Catalog,
        model_constraints: &Constraints,
        demo_constraints: &Constraints,
        ctx: &ExecutionContext,
        log_dir: &Path,
    ) -> Result<(CorrelationReport, RunManifest)> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tokio::fs::create_dir_all(log_dir).await?;

        let report = self
            .compute(models, demos, model_constraints, demo_constraints, ctx)
            .await?;

        let report_path = RunManifest::report_path_for(log_dir, run_id);
        report.save(&report_path).await?;

        let manifest = RunManifest {
            run_id,
            started_at,
            model_constraints: model_constraints.clone(),
            demo_constraints: demo_constraints.clone(),
            max_demo_set_size: self.config.max_demo_set_size,
            baseline_reward: self.config.baseline_reward,
            models_evaluated: report.correlations.len(),
            demos_used: report.demos_used,
            skipped: report.skipped.clone(),
            report_path,
        };
        manifest
            .save(&RunManifest::manifest_path_for(log_dir, run_id))
            .await?;

        Ok((report, manifest))
    }

    async fn load_demonstrations(
        &self,
        demos: &Catalog,
        constraints: &Constraints,
        skipped: &mut Vec<SkippedEntry>,
    ) -> Vec<Demonstration> {
        let mut loaded = Vec::new();
        // Every model scores the same demos, so all of them share the first demo's frame shape
        let mut shape: Option<FrameShape> = None;
        for (row, entry) in demos.iter().enumerate() {
            if loaded.len() >= self.config.max_demo_set_size {
                break;
            }
            let result = match constraints.matches(entry) {
                Ok(false) => continue,
                Ok(true) => load_demonstration(demos, entry).await,
                Err(e) => Err(e),
            };
            let demo = match result {
                Ok(demo) => demo,
                Err(e) => {
                    skip(skipped, CatalogKind::Demo, row, entry, &e);
                    continue;
                }
            };
            match shape {
                Some(expected) if expected != demo.frame_shape() => {
                    let e = TrexError::DimensionMismatch {
                        expected: expected.to_vec(),
                        actual: demo.frame_shape().to_vec(),
                    };
                    skip(skipped, CatalogKind::Demo, row, entry, &e);
                }
                _ => {
                    shape = Some(demo.frame_shape());
                    loaded.push(demo);
                }
            }
        }
        loaded
    }

    async fn correlate(
        &self,
        models: &Catalog,
        entry: &CatalogEntry,
        demonstrations: &[Demonstration],
        truths: &[f64],
        index: usize,
        total: usize,
    ) -> Result<(String, (f64, f64))> {
        let id = entry.id()?;
        let path = models.resolve(entry)?;
        info!("{}/{}: {}, {}", index + 1, total, id, path.display());

        let predicted = if self.config.baseline_reward {
            demonstrations.iter().map(|d| d.len() as f64).collect::<Vec<_>>()
        } else {
            let model = RewardNet::load(&path).await?;
            demonstrations
                .iter()
                .map(|d| predict_traj_return(&model, &d.frames()))
                .collect::<Result<Vec<_>>>()?
        };

        let corr = (pearson(&predicted, truths)?, spearman(&predicted, truths)?);
        Ok((id, corr))
    }
}

async fn load_demonstration(demos: &Catalog, entry: &CatalogEntry) -> Result<Demonstration> {
    let path: PathBuf = demos.resolve(entry)?;
    Demonstration::load(&path).await
}

fn select<'a>(
    catalog: &'a Catalog,
    constraints: &Constraints,
    kind: CatalogKind,
    skipped: &mut Vec<SkippedEntry>,
) -> Vec<(usize, &'a CatalogEntry)> {
    let mut rows = Vec::new();
    for (row, entry) in catalog.iter().enumerate() {
        match constraints.matches(entry) {
            Ok(true) => rows.push((row, entry)),
            Ok(false) => {}
            Err(e) => skip(skipped, kind, row, entry, &e),
        }
    }
    rows
}

fn skip(
    skipped: &mut Vec<SkippedEntry>,
    catalog: CatalogKind,
    row: usize,
    entry: &CatalogEntry,
    error: &TrexError,
) {
    let path = entry.get("path").ok().map(str::to_string);
    warn!(?catalog, row, path = path.as_deref().unwrap_or("-"), error = %error, "skipping catalog entry");
    skipped.push(SkippedEntry {
        catalog,
        row,
        path,
        reason: error.to_string(),
    });
}
