//! External store capabilities: documents in, models out.
//!
//! The pipeline never talks to a concrete backend directly; it calls these
//! traits. The filesystem implementations here back local runs and tests;
//! a production deployment substitutes its own document-store and
//! object-store clients behind the same seams.

use crate::dataset::Row;
use crate::error::{ClaimflowError, Result};
use crate::model::ModelBundle;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Capability to fetch raw records for ingestion.
pub trait DocumentStore {
    /// Fetch all records in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Connection`] when the store is unreachable
    /// or the collection does not exist.
    fn fetch(&self, collection: &str) -> Result<Vec<Row>>;
}

/// Capability to persist and retrieve deployed model bundles.
///
/// `upload` must be atomic: a reader never observes a partially written
/// model, and a failed upload leaves the previous model authoritative.
pub trait ModelStore {
    /// Replace the deployed model under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails; the prior model is unchanged.
    fn upload(&self, name: &str, bundle: &ModelBundle) -> Result<()>;

    /// Fetch the deployed model under `name`, or `None` if nothing is
    /// deployed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a deployed model exists but cannot be read back
    /// intact.
    fn download(&self, name: &str) -> Result<Option<ModelBundle>>;
}

/// Document store over a directory of JSON collection files.
///
/// A collection named `claims` is the file `<root>/claims.json` holding a
/// JSON array of row objects.
#[derive(Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Create a store over the given directory.
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl DocumentStore for FsDocumentStore {
    fn fetch(&self, collection: &str) -> Result<Vec<Row>> {
        if !self.root.is_dir() {
            return Err(ClaimflowError::Connection(format!(
                "document root {} does not exist",
                self.root.display()
            )));
        }
        let path = self.root.join(format!("{collection}.json"));
        if !path.exists() {
            return Err(ClaimflowError::Connection(format!(
                "collection '{collection}' not found under {}",
                self.root.display()
            )));
        }

        let bytes = fs::read(&path)?;
        let rows: Vec<Row> = serde_json::from_slice(&bytes)?;
        Ok(rows)
    }
}

/// Envelope written around a stored model so reads can verify integrity.
#[derive(Debug, Serialize, Deserialize)]
struct StoredModel {
    /// BLAKE3 hash of the serialized bundle.
    content_hash: String,
    /// The bundle itself.
    bundle: ModelBundle,
}

/// Model store over a local directory, with stage-then-rename replace.
#[derive(Debug)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    /// Create a store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.model.json"))
    }
}

impl ModelStore for FsModelStore {
    fn upload(&self, name: &str, bundle: &ModelBundle) -> Result<()> {
        let stored = StoredModel {
            content_hash: bundle.content_hash()?,
            bundle: bundle.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        // Stage to a temp file, then atomically rename over the old model.
        let path = self.model_path(name);
        let staged = path.with_extension("staged");
        {
            let file = File::create(&staged)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        fs::rename(&staged, &path)?;
        Ok(())
    }

    fn download(&self, name: &str) -> Result<Option<ModelBundle>> {
        let path = self.model_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let stored: StoredModel = serde_json::from_slice(&bytes)?;

        let actual = stored.bundle.content_hash()?;
        if actual != stored.content_hash {
            return Err(ClaimflowError::HashMismatch {
                expected: stored.content_hash,
                actual,
            });
        }

        Ok(Some(stored.bundle))
    }
}
