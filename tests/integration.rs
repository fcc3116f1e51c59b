//! End-to-end pipeline scenarios over filesystem-backed stores.

use claimflow::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = r#"
    [schema]
    label = "label"
    drift_threshold = 0.5

    [[schema.columns]]
    name = "age"
    type = "int"

    [[schema.columns]]
    name = "region"
    type = "categorical"

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
    min_score = 0.6
    learning_rate = 0.5
    epochs = 300

    [evaluation]
    improvement_margin = 0.02

    [pusher]
    model_name = "insurance-claims"
"#;

const REGIONS: [&str; 3] = ["north", "south", "east"];

/// 1,000-row claims collection where the label follows the claim amount.
fn write_claims(dir: &Path, drop_region: bool) {
    let rows: Vec<serde_json::Value> = (0..1000)
        .map(|i: u32| {
            let amount = f64::from(i % 100) * 100.0;
            let mut row = serde_json::json!({
                "_id": format!("oid-{i}"),
                "age": 20 + i % 50,
                "region": REGIONS[(i % 3) as usize],
                "claim_amount": amount,
                "label": u32::from(amount > 5000.0),
            });
            if drop_region {
                row.as_object_mut().unwrap().remove("region");
            }
            row
        })
        .collect();
    fs::write(dir.join("claims.json"), serde_json::to_vec(&rows).unwrap()).unwrap();
}

struct Env {
    _dir: TempDir,
    docs: PathBuf,
    models: FsModelStore,
    models_root: PathBuf,
    artifacts: PathBuf,
}

fn env(drop_region: bool) -> Env {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    write_claims(&docs, drop_region);
    let models_root = dir.path().join("models");

    Env {
        docs: docs.clone(),
        models: FsModelStore::new(&models_root).unwrap(),
        models_root,
        artifacts: dir.path().join("artifacts"),
        _dir: dir,
    }
}

fn run(env: &Env, config: &PipelineConfig) -> (RunReport, PathBuf) {
    let documents = FsDocumentStore::new(&env.docs);
    let pipeline = Pipeline::new(config, &documents, &env.models, &env.artifacts).unwrap();
    let run_dir = pipeline.artifacts().run_dir().to_path_buf();
    (pipeline.run(), run_dir)
}

#[test]
fn fresh_deployment_pushes_new_model() {
    let env = env(false);
    let config = PipelineConfig::from_toml_str(CONFIG).unwrap();

    let (report, run_dir) = run(&env, &config);

    assert_eq!(report.status, RunStatus::Done { pushed: true });

    let evaluation = report.evaluation.unwrap();
    assert!(evaluation.baseline_metric.is_none());
    assert!(evaluation.is_improvement);
    assert!(report.training_metric.unwrap() >= 0.6);

    let deployed = env.models.download("insurance-claims").unwrap().unwrap();
    assert_eq!(deployed.run_key, report.run_key);

    // audit trail: one artifact directory per stage plus the terminal report
    for stage in [
        "ingestion",
        "validation",
        "transformation",
        "training",
        "evaluation",
        "push",
    ] {
        assert!(run_dir.join(stage).join("payload.json").exists());
        assert!(run_dir.join(stage).join("manifest.json").exists());
    }
    assert!(run_dir.join("report.json").exists());
}

#[test]
fn worse_model_is_rejected_and_deployment_unchanged() {
    let env = env(false);
    let good = PipelineConfig::from_toml_str(CONFIG).unwrap();

    // First run deploys a well-trained model.
    let (first, _) = run(&env, &good);
    assert_eq!(first.status, RunStatus::Done { pushed: true });
    let deployed_before = env.models.download("insurance-claims").unwrap().unwrap();

    // Second run trains a deliberately useless model (zero epochs) with the
    // quality gate opened wide, so the decision lands at evaluation.
    let mut weak = good.clone();
    weak.training.epochs = 0;
    weak.training.min_score = 0.0;
    let (second, _) = run(&env, &weak);

    assert_eq!(second.status, RunStatus::Done { pushed: false });

    let evaluation = second.evaluation.unwrap();
    let baseline = evaluation.baseline_metric.unwrap();
    assert!(!evaluation.is_improvement);
    assert!(evaluation.new_metric < baseline);
    assert!(evaluation.delta < -0.02);
    assert_eq!(second.push.unwrap(), PushOutcome::Rejected);

    // the deployed model is byte-for-byte the first run's
    let deployed_after = env.models.download("insurance-claims").unwrap().unwrap();
    assert_eq!(
        deployed_after.content_hash().unwrap(),
        deployed_before.content_hash().unwrap()
    );
    assert_eq!(deployed_after.run_key, first.run_key);
}

#[test]
fn missing_column_fails_at_validation() {
    let env = env(true);
    let config = PipelineConfig::from_toml_str(CONFIG).unwrap();

    let (report, run_dir) = run(&env, &config);

    match &report.status {
        RunStatus::Failed { stage, reason } => {
            assert_eq!(*stage, PipelineStage::Validating);
            assert!(reason.contains("region"));
        }
        other => panic!("expected FAILED at validating, got {other:?}"),
    }

    let validation = report.validation.unwrap();
    assert!(!validation.passed);
    assert!(validation
        .issues
        .iter()
        .any(|i| i.column == "region" && !i.advisory));

    // ingestion and validation artifacts survive the failure; transformation
    // never ran and nothing was deployed
    assert!(run_dir.join("ingestion").join("payload.json").exists());
    assert!(run_dir.join("validation").join("payload.json").exists());
    assert!(!run_dir.join("transformation").exists());
    assert!(env.models.download("insurance-claims").unwrap().is_none());
}

#[test]
fn deployed_bundle_serves_raw_rows() {
    let env = env(false);
    let config = PipelineConfig::from_toml_str(CONFIG).unwrap();
    let (report, _) = run(&env, &config);
    assert!(report.is_done());

    let bundle = env.models.download("insurance-claims").unwrap().unwrap();

    let mut high = Row::new();
    high.insert("age".to_string(), serde_json::json!(45));
    high.insert("region".to_string(), serde_json::json!("north"));
    high.insert("claim_amount".to_string(), serde_json::json!(9500.0));
    high.insert("label".to_string(), serde_json::json!(1));

    let mut low = high.clone();
    low.insert("claim_amount".to_string(), serde_json::json!(100.0));
    low.insert("label".to_string(), serde_json::json!(0));

    assert!((bundle.predict(&high).unwrap() - 1.0).abs() < f64::EPSILON);
    assert!((bundle.predict(&low).unwrap()).abs() < f64::EPSILON);
}

#[test]
fn reruns_never_collide_on_artifacts() {
    let env = env(false);
    let config = PipelineConfig::from_toml_str(CONFIG).unwrap();

    let (first, first_dir) = run(&env, &config);
    let (second, second_dir) = run(&env, &config);

    assert_ne!(first.run_key, second.run_key);
    assert_ne!(first_dir, second_dir);
    assert!(first_dir.join("report.json").exists());
    assert!(second_dir.join("report.json").exists());
}

#[test]
fn predict_cli_handler_uses_deployed_model() {
    let env = env(false);
    let config = PipelineConfig::from_toml_str(CONFIG).unwrap();
    let (report, _) = run(&env, &config);
    assert!(report.is_done());

    let prediction = claimflow::cli::handle_predict(
        &env.models_root,
        "insurance-claims",
        r#"{"age": 40, "region": "south", "claim_amount": 9900.0, "label": 0}"#,
    )
    .unwrap();
    assert!((prediction - 1.0).abs() < f64::EPSILON);
}
