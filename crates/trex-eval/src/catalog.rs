//! Delimited catalogs of reward models and demonstrations, and row filters

use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use trex_core::{Result, TrexError};

/// Catalog file listing trained reward models
pub const MODEL_CATALOG: &str = "reward_model_infos.csv";
/// Catalog file listing demonstrations
pub const DEMO_CATALOG: &str = "demo_infos.csv";

/// Constraint key bounding a demonstration's `return`
pub const DEMO_MAX_RETURN: &str = "demo_max_return";
/// Constraint key bounding a reward model's `max_return`
pub const RM_MAX_RETURN: &str = "rm_max_return";

/// One catalog row, keyed by column name in header order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    fields: IndexMap<String, String>,
}

impl CatalogEntry {
    /// Row with the given fields
    pub fn new<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of a field
    pub fn get(&self, field: &str) -> Result<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| TrexError::MissingField(field.to_string()))
    }

    /// Field parsed as a number
    pub fn number(&self, field: &str) -> Result<f64> {
        let raw = self.get(field)?;
        raw.trim().parse().map_err(|_| TrexError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// The `path` field
    pub fn path(&self) -> Result<&Path> {
        self.get("path").map(Path::new)
    }

    /// File stem of `path`, used as the model identifier.
    ///
    /// A path without an extension keeps its whole file name as the id rather than an empty string.
    pub fn id(&self) -> Result<String> {
        let path = self.path()?;
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| TrexError::InvalidField {
                field: "path".to_string(),
                value: path.display().to_string(),
            })
    }

    /// All fields in column order
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }
}

/// Rows of one catalog file
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    base_dir: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Catalog from in-memory rows; relative paths resolve against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entries,
        }
    }

    /// Parse comma-delimited rows with a header line.
    ///
    /// Short rows are kept; their absent columns surface later as missing fields.
    pub fn from_reader<R: Read>(reader: R, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            entries.push(CatalogEntry::new(headers.iter().zip(record.iter())));
        }

        Ok(Self::new(base_dir, entries))
    }

    /// Read a catalog file
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let catalog = Self::from_reader(bytes.as_slice(), base_dir)?;
        tracing::debug!(path = %path.display(), rows = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    /// Read `reward_model_infos.csv` from a model directory
    pub async fn load_models(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(MODEL_CATALOG)).await
    }

    /// Read `demo_infos.csv` from a demonstration directory
    pub async fn load_demos(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(DEMO_CATALOG)).await
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows in file order
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    /// Location of the file an entry points at
    pub fn resolve(&self, entry: &CatalogEntry) -> Result<PathBuf> {
        Ok(self.base_dir.join(entry.path()?))
    }
}

/// Predicate on one catalog field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Field equals the value as a string
    Equals(String),
    /// Field parses as a number no greater than the bound
    AtMost(f64),
}

impl Constraint {
    /// Evaluate against one field value
    pub fn holds(&self, field: &str, entry: &CatalogEntry) -> Result<bool> {
        match self {
            Self::Equals(expected) => Ok(entry.get(field)? == expected),
            Self::AtMost(bound) => Ok(entry.number(field)? <= *bound),
        }
    }
}

/// Conjunction of field constraints; absent fields impose nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints(IndexMap<String, Constraint>);

impl Constraints {
    /// No constraints
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    #[must_use]
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), Constraint::Equals(value.into()));
        self
    }

    /// Require `field <= bound`
    #[must_use]
    pub fn at_most(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.0.insert(field.into(), Constraint::AtMost(bound));
        self
    }

    /// Build from string pairs as they appear in run configuration.
    ///
    /// `demo_max_return` and `rm_max_return` become upper bounds on `return`
    /// and `max_return`; every other key is an equality test.
    pub fn from_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut constraints = Self::new();
        for (key, value) in map {
            let (key, value) = (key.as_ref(), value.as_ref());
            let target = match key {
                DEMO_MAX_RETURN => Some("return"),
                RM_MAX_RETURN => Some("max_return"),
                _ => None,
            };
            constraints = match target {
                Some(field) => {
                    let bound = value.trim().parse().map_err(|_| {
                        TrexError::Config(format!("{key} must be numeric, got {value:?}"))
                    })?;
                    constraints.at_most(field, bound)
                }
                None => constraints.equals(key, value),
            };
        }
        Ok(constraints)
    }

    /// Check a row. A constrained field that is missing or unparseable is an error.
    pub fn matches(&self, entry: &CatalogEntry) -> Result<bool> {
        for (field, constraint) in &self.0 {
            if !constraint.holds(field, entry)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Number of constrained fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing is constrained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constraints in insertion order
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Constraint> {
        self.0.iter()
    }
}
