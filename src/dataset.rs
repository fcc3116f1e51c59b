//! Dataset types flowing between pipeline stages.
//!
//! Rows are plain JSON objects as fetched from the document store. Each
//! stage consumes the immutable artifact the prior stage emitted; nothing
//! here is ever mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single record: column name to value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The ingested collection of records for one pipeline run.
///
/// Immutable snapshot; store-internal identifier fields have already been
/// stripped by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecordSet {
    /// Collection the records were fetched from.
    pub collection: String,
    /// The fetched rows.
    pub rows: Vec<Row>,
    /// When the fetch happened.
    pub fetched_at: DateTime<Utc>,
}

impl RawRecordSet {
    /// Create a snapshot for the given collection.
    #[must_use]
    pub fn new(collection: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            collection: collection.into(),
            rows,
            fetched_at: Utc::now(),
        }
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Disjoint train/test partitions derived from a [`RawRecordSet`].
///
/// The partitions are produced by a deterministic seeded shuffle; the same
/// record set, ratio, and seed always yield the same split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    /// Training partition.
    pub train: Vec<Row>,
    /// Held-out test partition.
    pub test: Vec<Row>,
    /// Fraction of rows assigned to the training partition.
    pub split_ratio: f64,
    /// Seed used for the shuffle.
    pub seed: u64,
}

impl DatasetSplit {
    /// Total number of rows across both partitions.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.train.len() + self.test.len()
    }
}
