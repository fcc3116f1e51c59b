// Allow precision loss in metric and mean calculations (intentional)
#![allow(clippy::cast_precision_loss)]
// Allow pass-by-value for small config types
#![allow(clippy::needless_pass_by_value)]
// Allow format string style choices
#![allow(clippy::uninlined_format_args)]
// Doc backticks optional
#![allow(clippy::doc_markdown)]
// Allow missing docs for internal items
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Claimflow: an ML pipeline orchestrator for tabular insurance data.
//!
//! A run moves data through a fixed sequence of stages — ingestion,
//! validation, transformation, training, evaluation, and pushing —
//! producing a write-once artifact per stage and conditionally promoting
//! the trained model to the model store when it beats the deployed
//! baseline by more than a configured margin.
//!
//! # Quick Start
//!
//! ```no_run
//! use claimflow::prelude::*;
//!
//! let config = PipelineConfig::from_path("pipeline.toml")?;
//! let documents = FsDocumentStore::new("./data");
//! let models = FsModelStore::new("./models")?;
//!
//! let pipeline = Pipeline::new(&config, &documents, &models, "./artifacts")?;
//! let report = pipeline.run();
//!
//! match report.status {
//!     RunStatus::Done { pushed: true } => println!("new model deployed"),
//!     RunStatus::Done { pushed: false } => println!("rejected, model unchanged"),
//!     RunStatus::Failed { stage, reason } => println!("failed at {stage}: {reason}"),
//! }
//! # Ok::<(), claimflow::error::ClaimflowError>(())
//! ```
//!
//! # Architecture
//!
//! The orchestrator is an explicit state machine; each state carries
//! exactly the artifact the next stage consumes. Two gates can stop a
//! run: the schema-driven validation gate and the training quality gate.
//! A third decision point, evaluation, never fails the run — it decides
//! between promotion and the designed "rejected" outcome.
//!
//! External collaborators are capability traits: [`store::DocumentStore`]
//! for raw records and [`store::ModelStore`] for deployed bundles, with
//! filesystem implementations for local runs and tests.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod ingestion;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod pusher;
pub mod schema;
pub mod store;
pub mod trainer;
pub mod transform;
pub mod validation;

pub use error::{ClaimflowError, Result};
pub use pipeline::{Pipeline, RunReport, RunStatus};
