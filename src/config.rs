//! Pipeline configuration.
//!
//! One declarative TOML document drives a run: the schema, the ingestion
//! split, transformation behavior, training hyperparameters, the evaluation
//! margin, and the pusher's target. A malformed document fails the run
//! before ingestion begins.
//!
//! ## Example
//!
//! ```toml
//! [schema]
//! label = "label"
//! drift_threshold = 0.1
//!
//! [[schema.columns]]
//! name = "age"
//! type = "int"
//!
//! [[schema.columns]]
//! name = "region"
//! type = "categorical"
//!
//! [[schema.columns]]
//! name = "claim_amount"
//! type = "float"
//!
//! [[schema.columns]]
//! name = "label"
//! type = "int"
//!
//! [ingestion]
//! collection = "claims"
//! split_ratio = 0.8
//! seed = 42
//!
//! [training]
//! min_score = 0.6
//!
//! [evaluation]
//! improvement_margin = 0.02
//!
//! [pusher]
//! model_name = "insurance-claims"
//! ```

use crate::error::{ClaimflowError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Ingestion stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Collection identifier in the document store.
    pub collection: String,
    /// Fraction of rows assigned to the training partition.
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    /// Seed for the deterministic shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_split_ratio() -> f64 {
    0.8
}

fn default_seed() -> u64 {
    42
}

/// Transformation stage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Route unseen categorical values to a dedicated fallback slot instead
    /// of failing the stage.
    #[serde(default)]
    pub unknown_category_bucket: bool,
}

/// Estimator algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Binary logistic regression trained by gradient descent.
    #[default]
    LogisticRegression,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogisticRegression => write!(f, "logistic_regression"),
        }
    }
}

/// Training stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Estimator to fit.
    #[serde(default)]
    pub algorithm: Algorithm,
    /// Minimum acceptable test-partition metric; below this the run halts.
    pub min_score: f64,
    /// Gradient descent step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Number of full passes over the training matrix.
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    /// L2 regularization strength.
    #[serde(default)]
    pub l2: f64,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> u32 {
    200
}

/// Evaluation stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// A new model is an improvement only if its metric exceeds the
    /// deployed model's by more than this margin. Must be positive so a
    /// noise-level delta never triggers promotion.
    pub improvement_margin: f64,
    /// Treat an unscorable deployed model as "none deployed" instead of
    /// halting the run.
    #[serde(default)]
    pub treat_unscorable_as_absent: bool,
}

/// Pusher stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherConfig {
    /// Well-known name the deployed model lives under in the model store.
    pub model_name: String,
    /// Bounded number of upload attempts before surfacing the error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    3
}

/// The full configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Expected data shape and drift threshold.
    pub schema: Schema,
    /// Ingestion settings.
    pub ingestion: IngestionConfig,
    /// Transformation settings.
    #[serde(default)]
    pub transform: TransformConfig,
    /// Training settings.
    pub training: TrainingConfig,
    /// Evaluation settings.
    pub evaluation: EvaluationConfig,
    /// Pusher settings.
    pub pusher: PusherConfig,
}

impl PipelineConfig {
    /// Parse a configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a TOML error on malformed syntax, or
    /// [`ClaimflowError::Config`] on semantically invalid settings.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the content is
    /// invalid.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate all settings up front, before ingestion begins.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimflowError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        if self.ingestion.collection.is_empty() {
            return Err(ClaimflowError::Config(
                "ingestion.collection must not be empty".to_string(),
            ));
        }
        if !(self.ingestion.split_ratio > 0.0 && self.ingestion.split_ratio < 1.0) {
            return Err(ClaimflowError::Config(format!(
                "ingestion.split_ratio must be in (0, 1), got {}",
                self.ingestion.split_ratio
            )));
        }

        if !(0.0..=1.0).contains(&self.training.min_score) {
            return Err(ClaimflowError::Config(format!(
                "training.min_score must be in [0, 1], got {}",
                self.training.min_score
            )));
        }
        if self.training.learning_rate <= 0.0 || !self.training.learning_rate.is_finite() {
            return Err(ClaimflowError::Config(format!(
                "training.learning_rate must be positive, got {}",
                self.training.learning_rate
            )));
        }
        if self.training.l2 < 0.0 {
            return Err(ClaimflowError::Config(format!(
                "training.l2 must be non-negative, got {}",
                self.training.l2
            )));
        }

        if self.evaluation.improvement_margin <= 0.0
            || !self.evaluation.improvement_margin.is_finite()
        {
            return Err(ClaimflowError::Config(format!(
                "evaluation.improvement_margin must be positive, got {}",
                self.evaluation.improvement_margin
            )));
        }

        if self.pusher.model_name.is_empty() {
            return Err(ClaimflowError::Config(
                "pusher.model_name must not be empty".to_string(),
            ));
        }
        if self.pusher.max_attempts == 0 {
            return Err(ClaimflowError::Config(
                "pusher.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
