//! The pipeline orchestrator.
//!
//! An explicit state machine sequences the stages:
//!
//! ```text
//! INGESTING -> VALIDATING -> TRANSFORMING -> TRAINING -> EVALUATING -> PUSHING -> DONE
//!      \___________\_____________\______________\____________\____________\--> FAILED
//! ```
//!
//! Each transition happens only on the prior stage's success; any failure
//! moves directly to FAILED, recording which stage failed and why, and no
//! later stage executes. There is no partial resume: a failed run restarts
//! from INGESTING. Intermediate artifacts persist per stage, so earlier
//! successes stay inspectable after a later failure.

use crate::artifact::{ArtifactRef, ArtifactStore, RunKey};
use crate::config::PipelineConfig;
use crate::dataset::{DatasetSplit, Row};
use crate::error::Result;
use crate::evaluator::{self, EvaluationOutcome};
use crate::ingestion;
use crate::pusher::{self, PushOutcome};
use crate::store::{DocumentStore, ModelStore};
use crate::trainer::{self, TrainingOutput};
use crate::transform::{self, TransformedDataset};
use crate::validation::{self, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{error, info};

/// The stages of one run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Fetching and splitting raw records.
    Ingesting,
    /// Checking the split against the schema.
    Validating,
    /// Fitting and applying the feature transformation.
    Transforming,
    /// Fitting the estimator and enforcing the quality gate.
    Training,
    /// Comparing the new model against the deployed baseline.
    Evaluating,
    /// Uploading the accepted model (or declining).
    Pushing,
}

impl PipelineStage {
    /// Directory name for this stage's artifact.
    #[must_use]
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Self::Ingesting => "ingestion",
            Self::Validating => "validation",
            Self::Transforming => "transformation",
            Self::Training => "training",
            Self::Evaluating => "evaluation",
            Self::Pushing => "push",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ingesting => "ingesting",
            Self::Validating => "validating",
            Self::Transforming => "transforming",
            Self::Training => "training",
            Self::Evaluating => "evaluating",
            Self::Pushing => "pushing",
        };
        write!(f, "{s}")
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunStatus {
    /// All stages completed. `pushed` distinguishes promotion from the
    /// designed "rejected, model unchanged" outcome.
    Done {
        /// Whether the new model was uploaded.
        pushed: bool,
    },
    /// A stage failed; nothing after it executed.
    Failed {
        /// The stage that failed.
        stage: PipelineStage,
        /// Why it failed.
        reason: String,
    },
}

/// The single terminal report of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run key (timestamp plus short id).
    pub run_key: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub finished_at: DateTime<Utc>,
    /// Terminal status.
    pub status: RunStatus,
    /// Validation findings, if validation ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    /// Training metric, if training succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_metric: Option<f64>,
    /// Evaluation decision, if evaluation ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationOutcome>,
    /// Push outcome, if the pusher ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushOutcome>,
}

impl RunReport {
    /// Whether the run reached DONE.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.status, RunStatus::Done { .. })
    }
}

/// Typed state machine: each variant carries exactly the artifacts the next
/// stage consumes, so a stage can never read data an earlier stage did not
/// produce.
enum Step {
    Ingest,
    Validate {
        split: DatasetSplit,
        upstream: ArtifactRef,
    },
    Transform {
        split: DatasetSplit,
        upstream: ArtifactRef,
    },
    Train {
        data: TransformedDataset,
        test_rows: Vec<Row>,
        upstream: ArtifactRef,
    },
    Evaluate {
        output: TrainingOutput,
        test_rows: Vec<Row>,
        upstream: ArtifactRef,
    },
    Push {
        output: TrainingOutput,
        outcome: EvaluationOutcome,
        upstream: ArtifactRef,
    },
    Done {
        push: PushOutcome,
    },
}

impl Step {
    fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Ingest => Some(PipelineStage::Ingesting),
            Self::Validate { .. } => Some(PipelineStage::Validating),
            Self::Transform { .. } => Some(PipelineStage::Transforming),
            Self::Train { .. } => Some(PipelineStage::Training),
            Self::Evaluate { .. } => Some(PipelineStage::Evaluating),
            Self::Push { .. } => Some(PipelineStage::Pushing),
            Self::Done { .. } => None,
        }
    }
}

/// One sequential pipeline run over external store capabilities.
///
/// `Debug` is implemented manually because the store fields are trait
/// objects without a `Debug` bound.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    documents: &'a dyn DocumentStore,
    models: &'a dyn ModelStore,
    artifacts: ArtifactStore,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    /// Prepare a run: validate the configuration and create the run-scoped
    /// artifact directory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ClaimflowError::Config`] on invalid
    /// configuration (before ingestion begins) or an IO error if the
    /// artifact directory cannot be created.
    pub fn new<P: AsRef<Path>>(
        config: &'a PipelineConfig,
        documents: &'a dyn DocumentStore,
        models: &'a dyn ModelStore,
        artifact_root: P,
    ) -> Result<Self> {
        config.validate()?;
        let artifacts = ArtifactStore::create(artifact_root, RunKey::now())?;
        Ok(Self {
            config,
            documents,
            models,
            artifacts,
        })
    }

    /// The artifact store for this run.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Execute the run to its terminal state and persist the report.
    ///
    /// Stage failures do not surface as `Err`: they are the FAILED terminal
    /// state, recorded in the returned report.
    #[must_use]
    pub fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let run_key = self.artifacts.run_key().as_str().to_string();
        info!(%run_key, "pipeline run starting");

        let mut validation_report = None;
        let mut training_metric = None;
        let mut evaluation_outcome = None;
        let mut push_outcome = None;

        let mut step = Step::Ingest;
        let status = loop {
            let stage = step.stage();
            match self.advance(
                step,
                &mut validation_report,
                &mut training_metric,
                &mut evaluation_outcome,
                &mut push_outcome,
            ) {
                Ok(Step::Done { push }) => {
                    break RunStatus::Done {
                        pushed: push.is_pushed(),
                    };
                }
                Ok(next) => step = next,
                Err(cause) => {
                    let stage = stage.unwrap_or(PipelineStage::Ingesting);
                    error!(%stage, %cause, "stage failed; run moves to FAILED");
                    break RunStatus::Failed {
                        stage,
                        reason: cause.to_string(),
                    };
                }
            }
        };

        let report = RunReport {
            run_key,
            started_at,
            finished_at: Utc::now(),
            status,
            validation: validation_report,
            training_metric,
            evaluation: evaluation_outcome,
            push: push_outcome,
        };

        match &report.status {
            RunStatus::Done { pushed } => info!(pushed = *pushed, "pipeline run done"),
            RunStatus::Failed { stage, reason } => {
                error!(%stage, %reason, "pipeline run failed");
            }
        }

        if let Err(cause) = self.artifacts.write_report(&report) {
            error!(%cause, "failed to persist run report");
        }

        report
    }

    /// Execute one stage and return the next state.
    #[allow(clippy::too_many_lines)]
    fn advance(
        &self,
        step: Step,
        validation_report: &mut Option<ValidationReport>,
        training_metric: &mut Option<f64>,
        evaluation_outcome: &mut Option<EvaluationOutcome>,
        push_outcome: &mut Option<PushOutcome>,
    ) -> Result<Step> {
        match step {
            Step::Ingest => {
                let split = ingestion::ingest(self.documents, &self.config.ingestion)?;
                let upstream = self.artifacts.write_stage(
                    PipelineStage::Ingesting.artifact_name(),
                    &split,
                    None,
                )?;
                Ok(Step::Validate { split, upstream })
            }

            Step::Validate { split, upstream } => {
                let report = validation::validate(&split, &self.config.schema);
                let artifact = self.artifacts.write_stage(
                    PipelineStage::Validating.artifact_name(),
                    &report,
                    Some(&upstream),
                )?;
                *validation_report = Some(report.clone());
                // the gate: a negative report halts the run here
                report.into_gate()?;
                Ok(Step::Transform {
                    split,
                    upstream: artifact,
                })
            }

            Step::Transform { split, upstream } => {
                let data = transform::transform_split(
                    &split,
                    &self.config.schema,
                    &self.config.transform,
                )?;
                let artifact = self.artifacts.write_stage(
                    PipelineStage::Transforming.artifact_name(),
                    &data,
                    Some(&upstream),
                )?;
                Ok(Step::Train {
                    data,
                    test_rows: split.test,
                    upstream: artifact,
                })
            }

            Step::Train {
                data,
                test_rows,
                upstream,
            } => {
                let output = trainer::train(
                    &data,
                    &self.config.training,
                    self.artifacts.run_key().as_str(),
                )?;
                let artifact = self.artifacts.write_stage(
                    PipelineStage::Training.artifact_name(),
                    &output.bundle,
                    Some(&upstream),
                )?;
                *training_metric = Some(output.metric);
                Ok(Step::Evaluate {
                    output,
                    test_rows,
                    upstream: artifact,
                })
            }

            Step::Evaluate {
                output,
                test_rows,
                upstream,
            } => {
                let outcome = evaluator::evaluate(
                    self.models,
                    &self.config.pusher.model_name,
                    &output.bundle,
                    &test_rows,
                    &self.config.evaluation,
                )?;
                let artifact = self.artifacts.write_stage(
                    PipelineStage::Evaluating.artifact_name(),
                    &outcome,
                    Some(&upstream),
                )?;
                *evaluation_outcome = Some(outcome.clone());
                Ok(Step::Push {
                    output,
                    outcome,
                    upstream: artifact,
                })
            }

            Step::Push {
                output,
                outcome,
                upstream,
            } => {
                let push = pusher::push(self.models, &output.bundle, &outcome, &self.config.pusher)?;
                self.artifacts.write_stage(
                    PipelineStage::Pushing.artifact_name(),
                    &push,
                    Some(&upstream),
                )?;
                *push_outcome = Some(push.clone());
                Ok(Step::Done { push })
            }

            Step::Done { push } => Ok(Step::Done { push }),
        }
    }
}
