//! Model promotion: upload the accepted bundle, or explicitly decline.
//!
//! A rejected outcome is a designed no-op: the deployed model stays exactly
//! as it was. An accepted outcome uploads through the store's atomic-replace
//! contract with a bounded number of attempts; if all attempts fail the
//! previously deployed model remains authoritative.

use crate::config::PusherConfig;
use crate::error::{ClaimflowError, Result};
use crate::evaluator::EvaluationOutcome;
use crate::model::ModelBundle;
use crate::store::ModelStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the pusher did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The new model now serves under the well-known name.
    Pushed {
        /// Content hash of the uploaded bundle.
        content_hash: String,
        /// Upload attempts it took.
        attempts: u32,
    },
    /// Evaluation rejected the model; the store is untouched.
    Rejected,
}

impl PushOutcome {
    /// Whether an upload happened.
    #[must_use]
    pub fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed { .. })
    }
}

/// Run the pusher stage.
///
/// # Errors
///
/// Returns [`ClaimflowError::Pusher`] if every bounded upload attempt
/// failed.
pub fn push(
    store: &dyn ModelStore,
    bundle: &ModelBundle,
    outcome: &EvaluationOutcome,
    config: &PusherConfig,
) -> Result<PushOutcome> {
    if !outcome.is_improvement {
        info!(model = %config.model_name, "rejected, model unchanged");
        return Ok(PushOutcome::Rejected);
    }

    let content_hash = bundle.content_hash()?;
    let mut last_error = String::new();

    for attempt in 1..=config.max_attempts {
        match store.upload(&config.model_name, bundle) {
            Ok(()) => {
                info!(
                    model = %config.model_name,
                    %content_hash,
                    attempt,
                    "model pushed"
                );
                return Ok(PushOutcome::Pushed {
                    content_hash,
                    attempts: attempt,
                });
            }
            Err(cause) => {
                warn!(
                    model = %config.model_name,
                    attempt,
                    max_attempts = config.max_attempts,
                    %cause,
                    "upload attempt failed"
                );
                last_error = cause.to_string();
            }
        }
    }

    Err(ClaimflowError::Pusher {
        attempts: config.max_attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, TrainingConfig, TransformConfig};
    use crate::dataset::Row;
    use crate::model::FittedEstimator;
    use crate::schema::{ColumnSpec, ColumnType, Schema};
    use crate::transform::FittedTransform;
    use chrono::Utc;
    use serde_json::json;
    use std::cell::RefCell;

    fn bundle() -> ModelBundle {
        let schema = Schema {
            columns: vec![
                ColumnSpec::new("x", ColumnType::Float),
                ColumnSpec::new("label", ColumnType::Int),
            ],
            label: "label".to_string(),
            drift_threshold: 0.1,
        };
        let rows: Vec<Row> = [(-1.0, 0), (1.0, 1)]
            .iter()
            .map(|&(x, y)| {
                let mut r = Row::new();
                r.insert("x".to_string(), json!(x));
                r.insert("label".to_string(), json!(y));
                r
            })
            .collect();
        let transform =
            FittedTransform::fit(&schema, &rows, &TransformConfig::default()).unwrap();
        let (x, y) = transform.apply_partition(&rows).unwrap();
        let config = TrainingConfig {
            algorithm: Algorithm::LogisticRegression,
            min_score: 0.0,
            learning_rate: 0.5,
            epochs: 50,
            l2: 0.0,
        };
        ModelBundle {
            transform,
            estimator: FittedEstimator::fit(&config, &x, &y).unwrap(),
            trained_at: Utc::now(),
            training_metric: 1.0,
            run_key: "test".to_string(),
        }
    }

    fn outcome(is_improvement: bool) -> EvaluationOutcome {
        EvaluationOutcome {
            new_metric: 0.8,
            baseline_metric: Some(0.7),
            delta: 0.1,
            is_improvement,
            evaluated_at: Utc::now(),
        }
    }

    fn config() -> PusherConfig {
        PusherConfig {
            model_name: "insurance-claims".to_string(),
            max_attempts: 3,
        }
    }

    /// Store that fails the first `failures` uploads, then succeeds.
    struct FlakyStore {
        failures: RefCell<u32>,
        deployed: RefCell<Option<ModelBundle>>,
        upload_calls: RefCell<u32>,
    }

    impl FlakyStore {
        fn failing_first(failures: u32) -> Self {
            Self {
                failures: RefCell::new(failures),
                deployed: RefCell::new(None),
                upload_calls: RefCell::new(0),
            }
        }
    }

    impl ModelStore for FlakyStore {
        fn upload(&self, _name: &str, bundle: &ModelBundle) -> Result<()> {
            *self.upload_calls.borrow_mut() += 1;
            let mut failures = self.failures.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                return Err(ClaimflowError::Connection("upload refused".to_string()));
            }
            *self.deployed.borrow_mut() = Some(bundle.clone());
            Ok(())
        }

        fn download(&self, _name: &str) -> Result<Option<ModelBundle>> {
            Ok(self.deployed.borrow().clone())
        }
    }

    #[test]
    fn test_rejection_is_a_no_op() {
        let store = FlakyStore::failing_first(0);
        let result = push(&store, &bundle(), &outcome(false), &config()).unwrap();

        assert_eq!(result, PushOutcome::Rejected);
        assert_eq!(*store.upload_calls.borrow(), 0);
        assert!(store.deployed.borrow().is_none());
    }

    #[test]
    fn test_push_first_attempt() {
        let store = FlakyStore::failing_first(0);
        let result = push(&store, &bundle(), &outcome(true), &config()).unwrap();

        match result {
            PushOutcome::Pushed { attempts, .. } => assert_eq!(attempts, 1),
            PushOutcome::Rejected => panic!("expected push"),
        }
        assert!(store.deployed.borrow().is_some());
    }

    #[test]
    fn test_push_succeeds_within_retries() {
        let store = FlakyStore::failing_first(2);
        let result = push(&store, &bundle(), &outcome(true), &config()).unwrap();

        match result {
            PushOutcome::Pushed { attempts, .. } => assert_eq!(attempts, 3),
            PushOutcome::Rejected => panic!("expected push"),
        }
    }

    #[test]
    fn test_push_exhausts_retries() {
        let store = FlakyStore::failing_first(10);
        let err = push(&store, &bundle(), &outcome(true), &config()).unwrap_err();

        match err {
            ClaimflowError::Pusher { attempts, reason } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("upload refused"));
            }
            other => panic!("expected Pusher error, got {other:?}"),
        }
        // bounded: exactly max_attempts calls, and nothing deployed
        assert_eq!(*store.upload_calls.borrow(), 3);
        assert!(store.deployed.borrow().is_none());
    }

    #[test]
    fn test_pushed_hash_matches_bundle() {
        let store = FlakyStore::failing_first(0);
        let b = bundle();
        let result = push(&store, &b, &outcome(true), &config()).unwrap();

        match result {
            PushOutcome::Pushed { content_hash, .. } => {
                assert_eq!(content_hash, b.content_hash().unwrap());
            }
            PushOutcome::Rejected => panic!("expected push"),
        }
    }
}
