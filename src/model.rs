//! Estimators and the deployable model bundle.
//!
//! The estimator seam is a capability trait (fit, predict, serialize)
//! rather than an inheritance hierarchy; fitted estimators are carried in
//! a serde-tagged enum so a bundle round-trips through the model store
//! without dynamic dispatch gymnastics.

use crate::config::{Algorithm, TrainingConfig};
use crate::dataset::Row;
use crate::error::{ClaimflowError, Result};
use crate::transform::FittedTransform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability interface every estimator implements.
pub trait Estimator {
    /// Fit on a feature matrix and label vector.
    ///
    /// # Errors
    ///
    /// Returns an error on shape mismatches or degenerate inputs.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;

    /// Probability of the positive class for one feature vector.
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Hard 0/1 prediction at the 0.5 decision threshold.
    fn predict(&self, features: &[f64]) -> f64 {
        if self.predict_proba(features) >= 0.5 {
            1.0
        } else {
            0.0
        }
    }
}

/// Binary logistic regression trained by full-batch gradient descent.
///
/// Deterministic: weights initialize to zero, so the same matrix and
/// hyperparameters always produce the same fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Per-feature weights.
    pub weights: Vec<f64>,
    /// Intercept.
    pub bias: f64,
    /// Gradient descent step size.
    pub learning_rate: f64,
    /// Number of full passes over the training matrix.
    pub epochs: u32,
    /// L2 regularization strength.
    pub l2: f64,
}

impl LogisticRegression {
    /// Create an unfitted estimator from training settings.
    #[must_use]
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            weights: Vec::new(),
            bias: 0.0,
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            l2: config.l2,
        }
    }

    fn raw_score(&self, features: &[f64]) -> f64 {
        let dot: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum();
        dot + self.bias
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() {
            return Err(ClaimflowError::Ingestion(
                "cannot fit on an empty training matrix".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(ClaimflowError::Transformation(format!(
                "feature matrix has {} rows but label vector has {}",
                x.len(),
                y.len()
            )));
        }

        let n_features = x[0].len();
        let n = x.len() as f64;
        self.weights = vec![0.0; n_features];
        self.bias = 0.0;

        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;

            for (features, &label) in x.iter().zip(y.iter()) {
                let err = sigmoid(self.raw_score(features)) - label;
                for (g, &f) in grad_w.iter_mut().zip(features.iter()) {
                    *g += err * f;
                }
                grad_b += err;
            }

            for (w, g) in self.weights.iter_mut().zip(grad_w.iter()) {
                *w -= self.learning_rate * (g / n + self.l2 * *w);
            }
            self.bias -= self.learning_rate * grad_b / n;
        }

        Ok(())
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.raw_score(features))
    }
}

/// A fitted estimator, tagged for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum FittedEstimator {
    /// Fitted logistic regression.
    LogisticRegression(LogisticRegression),
}

impl FittedEstimator {
    /// Fit the configured algorithm on a training matrix.
    ///
    /// # Errors
    ///
    /// Propagates the underlying estimator's fit failure.
    pub fn fit(config: &TrainingConfig, x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        match config.algorithm {
            Algorithm::LogisticRegression => {
                let mut estimator = LogisticRegression::new(config);
                estimator.fit(x, y)?;
                Ok(Self::LogisticRegression(estimator))
            }
        }
    }

    /// Probability of the positive class.
    #[must_use]
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression(m) => m.predict_proba(features),
        }
    }

    /// Hard 0/1 prediction.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression(m) => m.predict(features),
        }
    }
}

/// F1 score with positive class `1`.
///
/// Returns 0 when no true or predicted positives exist; a predictor that
/// never finds the positive class earns nothing.
#[must_use]
pub fn f1_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut fn_ = 0u64;

    for (&truth, &pred) in y_true.iter().zip(y_pred.iter()) {
        let truth_pos = truth >= 0.5;
        let pred_pos = pred >= 0.5;
        match (truth_pos, pred_pos) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        2.0 * tp as f64 / denom as f64
    }
}

/// The deployable unit: fitted transform plus fitted estimator.
///
/// Maps a raw row straight to a prediction; this is what the model store
/// holds and what the serving boundary consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Fitted transformation object.
    pub transform: FittedTransform,
    /// Fitted estimator.
    pub estimator: FittedEstimator,
    /// When training finished.
    pub trained_at: DateTime<Utc>,
    /// Metric achieved on the held-out test partition at training time.
    pub training_metric: f64,
    /// Run that produced the bundle.
    pub run_key: String,
}

impl ModelBundle {
    /// Predict the label for one raw row.
    ///
    /// # Errors
    ///
    /// Returns a transformation error if the row does not fit the bundled
    /// transform (missing column, unseen category).
    pub fn predict(&self, row: &Row) -> Result<f64> {
        let features = self.transform.apply(row)?;
        Ok(self.estimator.predict(&features))
    }

    /// Score the bundle on raw rows with labels, using the pipeline's
    /// single metric definition ([`f1_score`]).
    ///
    /// # Errors
    ///
    /// Propagates the first row that cannot be transformed or is missing
    /// its label.
    pub fn score(&self, rows: &[Row]) -> Result<f64> {
        let mut y_true = Vec::with_capacity(rows.len());
        let mut y_pred = Vec::with_capacity(rows.len());
        for row in rows {
            y_pred.push(self.predict(row)?);
            y_true.push(self.transform.label_of(row)?);
        }
        Ok(f1_score(&y_true, &y_pred))
    }

    /// Serialize the bundle for storage.
    ///
    /// # Errors
    ///
    /// Returns a JSON error on serialization failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize a bundle from storage.
    ///
    /// # Errors
    ///
    /// Returns a JSON error on malformed bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// BLAKE3 content hash of the serialized bundle.
    ///
    /// # Errors
    ///
    /// Returns a JSON error on serialization failure.
    pub fn content_hash(&self) -> Result<String> {
        Ok(hex::encode(blake3::hash(&self.to_bytes()?).as_bytes()))
    }
}
