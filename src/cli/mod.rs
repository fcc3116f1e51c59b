//! CLI command handlers.
//!
//! This module contains the business logic for CLI commands, separated
//! from argument parsing for testability.

use crate::dataset::Row;
use crate::error::{ClaimflowError, Result};
use crate::model::ModelBundle;
use crate::pipeline::{RunReport, RunStatus};
use crate::pusher::PushOutcome;
use crate::store::{FsDocumentStore, FsModelStore, ModelStore};
use std::fmt::Write;
use std::path::Path;

/// Run the pipeline with filesystem-backed stores.
///
/// # Errors
///
/// Returns a config or IO error before the run starts; stage failures are
/// reported inside the returned [`RunReport`].
pub fn handle_run(
    config_path: &Path,
    documents_root: &Path,
    models_root: &Path,
    artifacts_root: &Path,
) -> Result<RunReport> {
    let config = crate::config::PipelineConfig::from_path(config_path)?;
    let documents = FsDocumentStore::new(documents_root);
    let models = FsModelStore::new(models_root)?;
    let pipeline = crate::pipeline::Pipeline::new(&config, &documents, &models, artifacts_root)?;
    Ok(pipeline.run())
}

/// Validate a configuration file without running anything.
///
/// # Errors
///
/// Returns the first configuration problem found.
pub fn handle_validate_config(config_path: &Path) -> Result<()> {
    crate::config::PipelineConfig::from_path(config_path).map(|_| ())
}

/// Predict a single raw row with the currently deployed model.
///
/// # Errors
///
/// Returns an error when no model is deployed, the row JSON is malformed,
/// or the row does not fit the deployed transform.
pub fn handle_predict(models_root: &Path, model_name: &str, row_json: &str) -> Result<f64> {
    let models = FsModelStore::new(models_root)?;
    let bundle: ModelBundle = models.download(model_name)?.ok_or_else(|| {
        ClaimflowError::Evaluation(format!("no model deployed under '{model_name}'"))
    })?;
    let row: Row = serde_json::from_str(row_json)?;
    bundle.predict(&row)
}

/// Format a run report for display.
#[must_use]
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run: {}", report.run_key);
    let _ = writeln!(out, "  Started:  {}", report.started_at);
    let _ = writeln!(out, "  Finished: {}", report.finished_at);

    match &report.status {
        RunStatus::Done { pushed } => {
            let _ = writeln!(out, "  Status:   done");
            let _ = writeln!(
                out,
                "  Outcome:  {}",
                if *pushed {
                    "new model pushed"
                } else {
                    "rejected, model unchanged"
                }
            );
        }
        RunStatus::Failed { stage, reason } => {
            let _ = writeln!(out, "  Status:   failed at {stage}");
            let _ = writeln!(out, "  Cause:    {reason}");
        }
    }

    if let Some(validation) = &report.validation {
        let _ = writeln!(out, "  Validation: {}", validation.summary());
    }
    if let Some(metric) = report.training_metric {
        let _ = writeln!(out, "  Training metric: {metric:.4}");
    }
    if let Some(eval) = &report.evaluation {
        match eval.baseline_metric {
            Some(baseline) => {
                let _ = writeln!(
                    out,
                    "  Evaluation: new {:.4} vs deployed {:.4} (delta {:+.4})",
                    eval.new_metric, baseline, eval.delta
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "  Evaluation: new {:.4}, no deployed baseline",
                    eval.new_metric
                );
            }
        }
    }
    if let Some(PushOutcome::Pushed {
        content_hash,
        attempts,
    }) = &report.push
    {
        let _ = writeln!(out, "  Pushed:   {content_hash} ({attempts} attempt(s))");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluationOutcome;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
        [schema]
        label = "label"
        drift_threshold = 0.5

        [[schema.columns]]
        name = "claim_amount"
        type = "float"

        [[schema.columns]]
        name = "label"
        type = "int"

        [ingestion]
        collection = "claims"
        split_ratio = 0.8
        seed = 42

        [training]
        min_score = 0.5
        learning_rate = 0.5
        epochs = 300

        [evaluation]
        improvement_margin = 0.02

        [pusher]
        model_name = "insurance-claims"
    "#;

    fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let config_path = dir.join("pipeline.toml");
        fs::write(&config_path, CONFIG).unwrap();

        let docs = dir.join("docs");
        fs::create_dir_all(&docs).unwrap();
        let rows: Vec<serde_json::Value> = (0..100)
            .map(|i| {
                let amount = f64::from(i) * 100.0;
                serde_json::json!({"claim_amount": amount, "label": i32::from(amount > 5000.0)})
            })
            .collect();
        fs::write(docs.join("claims.json"), serde_json::to_vec(&rows).unwrap()).unwrap();
        (config_path, docs)
    }

    #[test]
    fn test_handle_run_and_predict() {
        let dir = TempDir::new().unwrap();
        let (config_path, docs) = write_inputs(dir.path());
        let models = dir.path().join("models");
        let artifacts = dir.path().join("artifacts");

        let report = handle_run(&config_path, &docs, &models, &artifacts).unwrap();
        assert!(report.is_done());

        let prediction = handle_predict(
            &models,
            "insurance-claims",
            r#"{"claim_amount": 9000.0, "label": 0}"#,
        )
        .unwrap();
        assert!((prediction - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_handle_predict_without_deployment() {
        let dir = TempDir::new().unwrap();
        let err = handle_predict(
            dir.path(),
            "insurance-claims",
            r#"{"claim_amount": 1.0, "label": 0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no model deployed"));
    }

    #[test]
    fn test_handle_validate_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, CONFIG).unwrap();
        assert!(handle_validate_config(&path).is_ok());

        fs::write(&path, CONFIG.replace("split_ratio = 0.8", "split_ratio = 0.0")).unwrap();
        assert!(handle_validate_config(&path).is_err());
    }

    #[test]
    fn test_format_report_done() {
        let report = RunReport {
            run_key: "20260825_101500_ab12cd34".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            status: RunStatus::Done { pushed: false },
            validation: None,
            training_metric: Some(0.82),
            evaluation: Some(EvaluationOutcome {
                new_metric: 0.80,
                baseline_metric: Some(0.85),
                delta: -0.05,
                is_improvement: false,
                evaluated_at: Utc::now(),
            }),
            push: Some(PushOutcome::Rejected),
        };

        let out = format_report(&report);
        assert!(out.contains("rejected, model unchanged"));
        assert!(out.contains("0.8000 vs deployed 0.8500"));
        assert!(out.contains("Training metric: 0.8200"));
    }

    #[test]
    fn test_format_report_failed() {
        let report = RunReport {
            run_key: "k".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            status: RunStatus::Failed {
                stage: crate::pipeline::PipelineStage::Validating,
                reason: "missing column".to_string(),
            },
            validation: None,
            training_metric: None,
            evaluation: None,
            push: None,
        };

        let out = format_report(&report);
        assert!(out.contains("failed at validating"));
        assert!(out.contains("missing column"));
    }
}
