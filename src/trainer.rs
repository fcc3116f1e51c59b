//! Model training with a hard quality gate.
//!
//! Fits the configured estimator on the transformed training matrix, scores
//! it on the held-out test matrix, and packages estimator plus fitted
//! transform into a single deployable bundle. A metric below the configured
//! minimum is a stage failure, not a log line: no bundle is produced and
//! the run halts.

use crate::config::TrainingConfig;
use crate::error::{ClaimflowError, Result};
use crate::model::{f1_score, FittedEstimator, ModelBundle};
use crate::transform::TransformedDataset;
use chrono::Utc;
use tracing::info;

/// Result of a successful training stage.
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    /// The deployable bundle.
    pub bundle: ModelBundle,
    /// Metric achieved on the held-out test matrix.
    pub metric: f64,
}

/// Run the training stage.
///
/// # Errors
///
/// Returns [`ClaimflowError::Trainer`] when the test metric falls below
/// `config.min_score`, or propagates fit failures.
pub fn train(
    data: &TransformedDataset,
    config: &TrainingConfig,
    run_key: &str,
) -> Result<TrainingOutput> {
    let estimator = FittedEstimator::fit(config, &data.x_train, &data.y_train)?;

    let predictions: Vec<f64> = data.x_test.iter().map(|x| estimator.predict(x)).collect();
    let metric = f1_score(&data.y_test, &predictions);

    info!(
        algorithm = %config.algorithm,
        metric,
        threshold = config.min_score,
        "training finished"
    );

    if metric < config.min_score {
        return Err(ClaimflowError::Trainer {
            metric,
            threshold: config.min_score,
        });
    }

    Ok(TrainingOutput {
        bundle: ModelBundle {
            transform: data.transform.clone(),
            estimator,
            trained_at: Utc::now(),
            training_metric: metric,
            run_key: run_key.to_string(),
        },
        metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, TransformConfig};
    use crate::dataset::{DatasetSplit, Row};
    use crate::schema::{ColumnSpec, ColumnType, Schema};
    use crate::transform::transform_split;
    use serde_json::json;

    fn schema() -> Schema {
        Schema {
            columns: vec![
                ColumnSpec::new("x", ColumnType::Float),
                ColumnSpec::new("label", ColumnType::Int),
            ],
            label: "label".to_string(),
            drift_threshold: 0.1,
        }
    }

    fn row(x: f64, label: i64) -> Row {
        let mut r = Row::new();
        r.insert("x".to_string(), json!(x));
        r.insert("label".to_string(), json!(label));
        r
    }

    fn separable_data() -> TransformedDataset {
        let split = DatasetSplit {
            train: (-20..20).map(|i| row(f64::from(i), i64::from(i > 0))).collect(),
            test: (-5..5).map(|i| row(f64::from(i) + 0.5, i64::from(i >= 0))).collect(),
            split_ratio: 0.8,
            seed: 1,
        };
        transform_split(&split, &schema(), &TransformConfig::default()).unwrap()
    }

    fn config(min_score: f64) -> TrainingConfig {
        TrainingConfig {
            algorithm: Algorithm::LogisticRegression,
            min_score,
            learning_rate: 0.5,
            epochs: 500,
            l2: 0.0,
        }
    }

    #[test]
    fn test_train_above_threshold() {
        let output = train(&separable_data(), &config(0.6), "run-1").unwrap();
        assert!(output.metric >= 0.6);
        assert_eq!(output.bundle.run_key, "run-1");
        assert!((output.bundle.training_metric - output.metric).abs() < f64::EPSILON);
    }

    #[test]
    fn test_train_below_threshold_halts() {
        // Zero epochs leaves the estimator predicting the positive class
        // everywhere; its F1 on this test partition cannot reach 0.9.
        let mut c = config(0.9);
        c.epochs = 0;
        match train(&separable_data(), &c, "run-1") {
            Err(ClaimflowError::Trainer { metric, threshold }) => {
                assert!(metric < threshold);
                assert!((threshold - 0.9).abs() < f64::EPSILON);
            }
            other => panic!("expected Trainer error, got {other:?}"),
        }
    }

    #[test]
    fn test_bundle_carries_transform() {
        let data = separable_data();
        let output = train(&data, &config(0.0), "run-1").unwrap();
        assert_eq!(output.bundle.transform, data.transform);
    }
}
