//! Model evaluation: compare the fresh model against the deployed baseline.
//!
//! Both models are scored on the identical test partition with the identical
//! metric definition. With no baseline deployed the new model wins
//! unconditionally; otherwise it must beat the baseline by more than a small
//! positive margin, so a noise-level delta never triggers promotion.

use crate::config::EvaluationConfig;
use crate::dataset::Row;
use crate::error::{ClaimflowError, Result};
use crate::model::ModelBundle;
use crate::store::ModelStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The accept/reject decision with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Metric of the freshly trained model on the test partition.
    pub new_metric: f64,
    /// Metric of the currently deployed model, or `None` when nothing is
    /// deployed (or the baseline was explicitly treated as absent).
    pub baseline_metric: Option<f64>,
    /// `new_metric - baseline_metric`; equals `new_metric` with no baseline.
    pub delta: f64,
    /// Whether the new model should replace the deployed one.
    pub is_improvement: bool,
    /// When the evaluation ran.
    pub evaluated_at: DateTime<Utc>,
}

/// Run the evaluation stage.
///
/// # Errors
///
/// Returns [`ClaimflowError::Evaluation`] when a deployed model exists but
/// cannot be read back or scored and `treat_unscorable_as_absent` is off,
/// or propagates scoring failures of the new model.
pub fn evaluate(
    store: &dyn ModelStore,
    model_name: &str,
    new_model: &ModelBundle,
    test_rows: &[Row],
    config: &EvaluationConfig,
) -> Result<EvaluationOutcome> {
    let new_metric = new_model.score(test_rows)?;

    // A corrupt stored model is as unscorable as an incompatible one; both
    // fall under the same opt-in.
    let deployed = match store.download(model_name) {
        Ok(deployed) => deployed,
        Err(cause) if config.treat_unscorable_as_absent => {
            warn!(
                model = model_name,
                %cause,
                "deployed model unreadable; treating as absent"
            );
            None
        }
        Err(cause) => {
            return Err(ClaimflowError::Evaluation(format!(
                "deployed model '{model_name}' could not be read: {cause}"
            )));
        }
    };

    let baseline_metric = match deployed {
        None => {
            info!(model = model_name, "no deployed model; new model wins by default");
            None
        }
        Some(deployed) => match deployed.score(test_rows) {
            Ok(metric) => Some(metric),
            Err(cause) if config.treat_unscorable_as_absent => {
                warn!(
                    model = model_name,
                    %cause,
                    "deployed model unscorable; treating as absent"
                );
                None
            }
            Err(cause) => {
                return Err(ClaimflowError::Evaluation(format!(
                    "deployed model '{model_name}' could not be scored: {cause}"
                )));
            }
        },
    };

    let (delta, is_improvement) = match baseline_metric {
        None => (new_metric, true),
        Some(baseline) => {
            let delta = new_metric - baseline;
            (delta, delta > config.improvement_margin)
        }
    };

    info!(
        new_metric,
        baseline = ?baseline_metric,
        delta,
        is_improvement,
        "evaluation decision"
    );

    Ok(EvaluationOutcome {
        new_metric,
        baseline_metric,
        delta,
        is_improvement,
        evaluated_at: Utc::now(),
    })
}
