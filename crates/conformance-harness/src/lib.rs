//! # conformance-harness
//!
//! Offline plumbing around the scoring engine for model evaluation runs:
//! - Building test fixtures from stored episode records
//! - Assembling the evaluation suite handed to the external runner
//! - Summarising the runner's results document
//!
//! Nothing here calls a model. The runner executes the suite and invokes
//! the structural scorer from `conformance-core` once per output.

pub mod fixture;
pub mod results;
pub mod suite;

pub use fixture::{EpisodeRecord, ExpectedMeta, TestFixture};
pub use results::{ProviderScorecard, ResultsDocument, ResultsSummary};
pub use suite::{GenerationOptions, ProviderSpec, SuiteSettings};

use std::path::Path;

use thiserror::Error;

/// Errors raised while preparing or analysing an evaluation run.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Field {field} holds malformed JSON: {source}")]
    EmbeddedJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Read an exported list of episode records.
pub fn load_episodes(path: impl AsRef<Path>) -> Result<Vec<EpisodeRecord>, HarnessError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let records: Vec<EpisodeRecord> = serde_json::from_str(&content)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        count = records.len(),
        "Loaded episode records"
    );
    Ok(records)
}
