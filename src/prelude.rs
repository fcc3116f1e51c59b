//! Convenience re-exports for common claimflow usage.

pub use crate::artifact::{ArtifactManifest, ArtifactRef, ArtifactStore, RunKey};
pub use crate::config::{
    Algorithm, EvaluationConfig, IngestionConfig, PipelineConfig, PusherConfig, TrainingConfig,
    TransformConfig,
};
pub use crate::dataset::{DatasetSplit, RawRecordSet, Row};
pub use crate::error::{ClaimflowError, Result};
pub use crate::evaluator::EvaluationOutcome;
pub use crate::model::{Estimator, FittedEstimator, LogisticRegression, ModelBundle};
pub use crate::pipeline::{Pipeline, PipelineStage, RunReport, RunStatus};
pub use crate::pusher::PushOutcome;
pub use crate::schema::{ColumnSpec, ColumnType, Schema};
pub use crate::store::{DocumentStore, FsDocumentStore, FsModelStore, ModelStore};
pub use crate::transform::{FittedTransform, TransformedDataset};
pub use crate::validation::{ValidationIssue, ValidationReport};
