//! Data ingestion: fetch, clean, and split.
//!
//! Fetches every record in the configured collection, drops store-internal
//! identifier fields, and performs a deterministic seeded split into
//! disjoint train/test partitions.

use crate::config::IngestionConfig;
use crate::dataset::{DatasetSplit, RawRecordSet, Row};
use crate::error::{ClaimflowError, Result};
use crate::store::DocumentStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Run the ingestion stage.
///
/// # Errors
///
/// Returns [`ClaimflowError::Connection`] when the store is unreachable and
/// [`ClaimflowError::Ingestion`] when the fetched set is empty or the split
/// leaves a partition empty.
pub fn ingest(store: &dyn DocumentStore, config: &IngestionConfig) -> Result<DatasetSplit> {
    let rows = store.fetch(&config.collection)?;
    if rows.is_empty() {
        return Err(ClaimflowError::Ingestion(format!(
            "collection '{}' returned no records",
            config.collection
        )));
    }

    let rows: Vec<Row> = rows.into_iter().map(strip_internal_fields).collect();
    let record_set = RawRecordSet::new(&config.collection, rows);
    info!(
        collection = %config.collection,
        rows = record_set.len(),
        "fetched record set"
    );

    split_records(&record_set, config.split_ratio, config.seed)
}

/// Drop store-internal identifier fields (keys starting with `_`).
fn strip_internal_fields(row: Row) -> Row {
    row.into_iter().filter(|(k, _)| !k.starts_with('_')).collect()
}

/// Deterministic seeded split of a record set.
///
/// # Errors
///
/// Returns [`ClaimflowError::Ingestion`] if either partition would be empty.
pub fn split_records(records: &RawRecordSet, ratio: f64, seed: u64) -> Result<DatasetSplit> {
    let mut indices: Vec<usize> = (0..records.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let train_count = (records.len() as f64 * ratio).round() as usize;
    let train_count = train_count.clamp(0, records.len());

    let train: Vec<Row> = indices[..train_count]
        .iter()
        .map(|&i| records.rows[i].clone())
        .collect();
    let test: Vec<Row> = indices[train_count..]
        .iter()
        .map(|&i| records.rows[i].clone())
        .collect();

    if train.is_empty() || test.is_empty() {
        return Err(ClaimflowError::Ingestion(format!(
            "split ratio {ratio} over {} rows leaves a partition empty",
            records.len()
        )));
    }

    info!(train = train.len(), test = test.len(), seed, "split record set");

    Ok(DatasetSplit {
        train,
        test,
        split_ratio: ratio,
        seed,
    })
}
