//! Per-run, per-stage artifact storage.
//!
//! Every stage's output is persisted under a run-scoped directory so a later
//! failure never erases the evidence of earlier successes:
//!
//! ```text
//! artifacts/
//! └── 20260825_101500_ab12cd34/
//!     ├── ingestion/
//!     │   ├── payload.json
//!     │   └── manifest.json
//!     ├── validation/
//!     └── ...
//! ```
//!
//! Run directories are keyed by timestamp plus a short run id so concurrent
//! clocks never collide. Within a run each artifact is written exactly once
//! and only read afterwards.

use crate::error::{ClaimflowError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Key identifying one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunKey(String);

impl RunKey {
    /// Create a key for a run starting now.
    #[must_use]
    pub fn now() -> Self {
        let short_id = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            short_id
        ))
    }

    /// The key as a path-safe string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Audit manifest written beside each stage payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Stage that produced the artifact.
    pub stage: String,
    /// Run the artifact belongs to.
    pub run_key: String,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
    /// BLAKE3 hash of the serialized payload.
    pub content_hash: String,
    /// Content hash of the upstream artifact this stage consumed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
}

/// Reference to a written artifact, handed to the next stage for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Stage name.
    pub stage: String,
    /// Directory the artifact lives in.
    pub path: PathBuf,
    /// BLAKE3 hash of the payload.
    pub content_hash: String,
}

/// Write-once artifact storage scoped to a single run.
#[derive(Debug)]
pub struct ArtifactStore {
    run_dir: PathBuf,
    run_key: RunKey,
}

impl ArtifactStore {
    /// Create the run directory under the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create<P: AsRef<Path>>(root: P, run_key: RunKey) -> Result<Self> {
        let run_dir = root.as_ref().join(run_key.as_str());
        fs::create_dir_all(&run_dir)?;
        Ok(Self { run_dir, run_key })
    }

    /// The run this store is scoped to.
    #[must_use]
    pub fn run_key(&self) -> &RunKey {
        &self.run_key
    }

    /// Directory for this run.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Persist a stage payload plus its manifest.
    ///
    /// The payload is staged to a temp file and renamed so a crash never
    /// leaves a half-written artifact behind.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::ArtifactExists`] if the stage already wrote
    /// its artifact this run, or an IO/serialization error.
    pub fn write_stage<T: Serialize>(
        &self,
        stage: &str,
        payload: &T,
        upstream: Option<&ArtifactRef>,
    ) -> Result<ArtifactRef> {
        let stage_dir = self.run_dir.join(stage);
        let payload_path = stage_dir.join("payload.json");
        if payload_path.exists() {
            return Err(ClaimflowError::ArtifactExists(payload_path));
        }
        fs::create_dir_all(&stage_dir)?;

        let bytes = serde_json::to_vec_pretty(payload)?;
        let content_hash = hex::encode(blake3::hash(&bytes).as_bytes());

        write_atomic(&payload_path, &bytes)?;

        let manifest = ArtifactManifest {
            stage: stage.to_string(),
            run_key: self.run_key.as_str().to_string(),
            created_at: Utc::now(),
            content_hash: content_hash.clone(),
            upstream: upstream.map(|r| r.content_hash.clone()),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&stage_dir.join("manifest.json"), &manifest_bytes)?;

        Ok(ArtifactRef {
            stage: stage.to_string(),
            path: stage_dir,
            content_hash,
        })
    }

    /// Read a stage payload back, verifying it against its manifest hash.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::ArtifactNotFound`] if the stage never wrote,
    /// or [`ClaimflowError::HashMismatch`] if the payload was tampered with.
    pub fn read_stage<T: DeserializeOwned>(&self, stage: &str) -> Result<T> {
        let stage_dir = self.run_dir.join(stage);
        let payload_path = stage_dir.join("payload.json");
        if !payload_path.exists() {
            return Err(ClaimflowError::ArtifactNotFound(payload_path));
        }

        let bytes = fs::read(&payload_path)?;
        let manifest: ArtifactManifest =
            serde_json::from_slice(&fs::read(stage_dir.join("manifest.json"))?)?;

        let actual = hex::encode(blake3::hash(&bytes).as_bytes());
        if actual != manifest.content_hash {
            return Err(ClaimflowError::HashMismatch {
                expected: manifest.content_hash,
                actual,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether a stage has written its artifact this run.
    #[must_use]
    pub fn has_stage(&self, stage: &str) -> bool {
        self.run_dir.join(stage).join("payload.json").exists()
    }

    /// Persist the terminal run report at the run-directory root.
    ///
    /// Unlike stage artifacts this may be written again: a failed run
    /// overwrites the in-progress report with its terminal one.
    ///
    /// # Errors
    ///
    /// Returns an IO or serialization error.
    pub fn write_report<T: Serialize>(&self, report: &T) -> Result<PathBuf> {
        let path = self.run_dir.join("report.json");
        write_atomic(&path, &serde_json::to_vec_pretty(report)?)?;
        Ok(path)
    }
}

/// Write bytes via a temp file and an atomic rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}
