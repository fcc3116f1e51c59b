//! Error types for claimflow pipeline operations.

use crate::validation::ValidationReport;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for claimflow operations.
pub type Result<T> = std::result::Result<T, ClaimflowError>;

/// Errors that can occur during a pipeline run.
///
/// Every stage either returns a successful artifact or exactly one of these;
/// the orchestrator records the failing stage and invokes nothing further.
#[derive(Error, Debug)]
pub enum ClaimflowError {
    /// Malformed pipeline configuration. Fails before ingestion begins.
    #[error("config error: {0}")]
    Config(String),

    /// Document store unreachable.
    #[error("document store unreachable: {0}")]
    Connection(String),

    /// Ingestion failed (empty result set, bad split).
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// A column failed the schema contract. Validation catches this and
    /// converts it into a negative [`ValidationReport`]; it never crosses
    /// the stage boundary raw.
    #[error("schema mismatch in column '{column}': {reason}")]
    SchemaMismatch {
        /// Offending column name.
        column: String,
        /// What did not line up.
        reason: String,
    },

    /// The validation gate rejected the ingested dataset.
    #[error("pipeline halted at validation: {}", report.summary())]
    Halted {
        /// The negative report that closed the gate.
        report: Box<ValidationReport>,
    },

    /// Feature transformation failed (unseen category, uncoercible value).
    #[error("transformation error: {0}")]
    Transformation(String),

    /// Training metric fell below the configured quality gate.
    #[error("training metric {metric:.4} below minimum threshold {threshold:.4}")]
    Trainer {
        /// Metric computed on the held-out test partition.
        metric: f64,
        /// Configured minimum acceptable score.
        threshold: f64,
    },

    /// The deployed baseline model could not be scored.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Model upload failed after bounded retries. The previously deployed
    /// model remains authoritative.
    #[error("model push failed after {attempts} attempt(s): {reason}")]
    Pusher {
        /// Number of upload attempts made.
        attempts: u32,
        /// Last upload failure.
        reason: String,
    },

    /// A stage tried to overwrite an artifact within the same run.
    #[error("artifact already written: {}", .0.display())]
    ArtifactExists(PathBuf),

    /// Expected artifact is missing.
    #[error("artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// Stored content does not match its recorded hash.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash recorded at write time.
        expected: String,
        /// Hash computed from the bytes read back.
        actual: String,
    },

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization failed.
    #[error("TOML error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
}
