//! Correlation reports, run manifests, and grouping by catalog field

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use trex_core::{Result, TrexError};

use crate::catalog::{Catalog, Constraints};
use crate::stats::mean_std;

/// Field reward models are grouped by by default
pub const NUM_DEMS_FIELD: &str = "num_dems";

/// Which catalog a skipped row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// Reward model catalog
    Model,
    /// Demonstration catalog
    Demo,
}

/// A catalog row left out because of a data error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Catalog the row belongs to
    pub catalog: CatalogKind,
    /// Zero-based row index, header excluded
    pub row: usize,
    /// The row's `path`, when present
    pub path: Option<String>,
    /// Error text
    pub reason: String,
}

/// Correlation of every evaluated model with ground truth
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationReport {
    /// Model id to `(pearson, spearman)`, in catalog order
    pub correlations: IndexMap<String, (f64, f64)>,
    /// Rows left out because of data errors
    pub skipped: Vec<SkippedEntry>,
    /// Demonstrations the correlations were computed on
    pub demos_used: usize,
}

impl CorrelationReport {
    /// Write `{id: [pearson, spearman]}` as JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.correlations)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), models = self.correlations.len(), "saved correlations");
        Ok(())
    }

    /// Read a file written by [`CorrelationReport::save`].
    ///
    /// Only the correlations are persisted, so `skipped` comes back empty and
    /// `demos_used` as zero.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Ok(Self {
            correlations: serde_json::from_str(&json)?,
            ..Self::default()
        })
    }

    /// Group correlations by a field of the model catalog.
    ///
    /// Groups come back sorted by their key read as a number. Catalog rows
    /// for models absent from the report are ignored; rows lacking the field
    /// are skipped with a warning.
    pub fn summarize_by(&self, models: &Catalog, field: &str) -> Result<Vec<GroupSummary>> {
        let mut groups: IndexMap<String, Vec<(f64, f64)>> = IndexMap::new();
        for (row, entry) in models.iter().enumerate() {
            let Ok(id) = entry.id() else { continue };
            let Some(&corr) = self.correlations.get(&id) else {
                continue;
            };
            match entry.get(field) {
                Ok(key) => groups.entry(key.to_string()).or_default().push(corr),
                Err(e) => warn!(row, id = %id, error = %e, "skipping model without group field"),
            }
        }

        let mut summaries = groups
            .into_iter()
            .map(|(key, corrs)| {
                let order = key.trim().parse::<f64>().map_err(|_| TrexError::InvalidField {
                    field: field.to_string(),
                    value: key.clone(),
                })?;
                let pearsons: Vec<f64> = corrs.iter().map(|c| c.0).collect();
                let spearmans: Vec<f64> = corrs.iter().map(|c| c.1).collect();
                let (pearson_mean, pearson_std) = mean_std(&pearsons);
                let (spearman_mean, spearman_std) = mean_std(&spearmans);
                Ok((
                    order,
                    GroupSummary {
                        key,
                        count: corrs.len(),
                        pearson_mean,
                        pearson_std,
                        spearman_mean,
                        spearman_std,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        summaries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(summaries.into_iter().map(|(_, s)| s).collect())
    }
}

/// Aggregate correlations of the models sharing one field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Field value
    pub key: String,
    /// Models in the group
    pub count: usize,
    /// Mean Pearson correlation
    pub pearson_mean: f64,
    /// Population standard deviation of Pearson correlation
    pub pearson_std: f64,
    /// Mean Spearman correlation
    pub spearman_mean: f64,
    /// Population standard deviation of Spearman correlation
    pub spearman_std: f64,
}

/// Record of one correlation run, written next to its report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Unique run identifier
    pub run_id: Uuid,
    /// UTC start time
    pub started_at: DateTime<Utc>,
    /// Filters applied to the model catalog
    pub model_constraints: Constraints,
    /// Filters applied to the demonstration catalog
    pub demo_constraints: Constraints,
    /// Upper limit on loaded demonstrations
    pub max_demo_set_size: usize,
    /// Whether trajectory length stood in for predicted return
    pub baseline_reward: bool,
    /// Models with a correlation in the report
    pub models_evaluated: usize,
    /// Demonstrations used
    pub demos_used: usize,
    /// Rows left out because of data errors
    pub skipped: Vec<SkippedEntry>,
    /// Location of the correlations file
    pub report_path: PathBuf,
}

impl RunManifest {
    /// `<log_dir>/correlations_<run_id>.json`
    #[must_use]
    pub fn report_path_for(log_dir: &Path, run_id: Uuid) -> PathBuf {
        log_dir.join(format!("correlations_{run_id}.json"))
    }

    /// `<log_dir>/manifest_<run_id>.json`
    #[must_use]
    pub fn manifest_path_for(log_dir: &Path, run_id: Uuid) -> PathBuf {
        log_dir.join(format!("manifest_{run_id}.json"))
    }

    /// Write as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn report(entries: &[(&str, f64, f64)]) -> CorrelationReport {
        CorrelationReport {
            correlations: entries
                .iter()
                .map(|&(id, p, s)| (id.to_string(), (p, s)))
                .collect(),
            ..CorrelationReport::default()
        }
    }

    #[tokio::test]
    async fn persisted_report_is_an_id_keyed_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corr.json");
        let original = report(&[("rm_b", 0.5, 0.25), ("rm_a", -0.75, 1.0)]);
        original.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["rm_a"], serde_json::json!([-0.75, 1.0]));

        let loaded = CorrelationReport::load(&path).await.unwrap();
        assert_eq!(loaded.correlations, original.correlations);
        let ids: Vec<_> = loaded.correlations.keys().cloned().collect();
        assert_eq!(ids, vec!["rm_b", "rm_a"]);
    }

    #[test]
    fn summarizes_by_numeric_group_key() {
        let csv = "path,num_dems\n\
                   m/a.params,12\n\
                   m/b.params,3\n\
                   m/c.params,12\n\
                   m/unused.params,3\n\
                   m/d.params\n";
        let models = Catalog::from_reader(csv.as_bytes(), ".").unwrap();
        let report = report(&[("a", 0.9, 0.8), ("b", 0.1, 0.2), ("c", 0.5, 0.6), ("d", 1.0, 1.0)]);

        let groups = report.summarize_by(&models, NUM_DEMS_FIELD).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "3");
        assert_eq!(groups[0].count, 1);
        assert_eq!(groups[0].pearson_std, 0.0);
        assert_eq!(groups[1].key, "12");
        assert_eq!(groups[1].count, 2);
        assert_relative_eq!(groups[1].pearson_mean, 0.7, epsilon = 1e-12);
        assert_relative_eq!(groups[1].pearson_std, 0.2, epsilon = 1e-12);
        assert_relative_eq!(groups[1].spearman_mean, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn non_numeric_group_key_is_an_error() {
        let models = Catalog::from_reader("path,num_dems\nm/a.params,many\n".as_bytes(), ".").unwrap();
        let report = report(&[("a", 0.9, 0.8)]);
        assert!(matches!(
            report.summarize_by(&models, NUM_DEMS_FIELD),
            Err(TrexError::InvalidField { .. })
        ));
    }

    #[test]
    fn run_files_are_named_by_run_id() {
        let id = Uuid::nil();
        assert_eq!(
            RunManifest::report_path_for(Path::new("logs"), id),
            PathBuf::from("logs/correlations_00000000-0000-0000-0000-000000000000.json")
        );
        assert_eq!(
            RunManifest::manifest_path_for(Path::new("logs"), id),
            PathBuf::from("logs/manifest_00000000-0000-0000-0000-000000000000.json")
        );
    }
}
