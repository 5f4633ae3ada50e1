//! Offline evaluation of learned reward models
//!
//! Reads catalogs of trained reward models and held-out demonstrations,
//! filters both by metadata constraints, and measures how well each model's
//! predicted trajectory return tracks the ground-truth return:
//! - Catalog parsing and constraint filtering
//! - Pearson and Spearman correlation
//! - Persisted reports, run manifests, and grouping by catalog field

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod correlation;
pub mod report;
pub mod stats;

// Re-export evaluation components
pub use catalog::{Catalog, CatalogEntry, Constraint, Constraints};
pub use correlation::{AnalyzerConfig, CorrelationAnalyzer};
pub use report::{CatalogKind, CorrelationReport, GroupSummary, RunManifest, SkippedEntry};
pub use stats::{pearson, spearman};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AnalyzerConfig, Catalog, Constraints, CorrelationAnalyzer, CorrelationReport,
    };
    pub use trex_core::prelude::*;
}
