//! Error types for the T-REX core library

use thiserror::Error;

/// Core error type for reward learning and evaluation
#[derive(Error, Debug)]
pub enum TrexError {
    /// Invalid configuration, detected before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Frame shape mismatch
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Not enough data to carry out an operation
    #[error("Insufficient data: need at least {needed}, got {actual}")]
    InsufficientData { needed: usize, actual: usize },

    /// Demonstrations are not sorted ascending by return
    #[error("Demonstrations not sorted by return: index {index} has return {value} below the previous {previous}")]
    Unsorted {
        index: usize,
        previous: f64,
        value: f64,
    },

    /// A catalog row lacks a required field
    #[error("Missing field `{0}`")]
    MissingField(String),

    /// A field could not be interpreted
    #[error("Invalid value {value:?} for field `{field}`")]
    InvalidField { field: String, value: String },

    /// Failure tied to one catalog entry (model or demonstration)
    #[error("{id}: {source}")]
    Entry {
        id: String,
        #[source]
        source: Box<TrexError>,
    },

    /// Correlation is not defined for the given data
    #[error("Correlation undefined: {0}")]
    UndefinedCorrelation(String),

    /// Numerical failure during training or evaluation
    #[error("Computation error: {0}")]
    Computation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catalog parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TrexError {
    /// Attach the identifier of the entry being processed
    #[must_use]
    pub fn for_entry(self, id: impl Into<String>) -> Self {
        Self::Entry {
            id: id.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for T-REX operations
pub type Result<T> = std::result::Result<T, TrexError>;
