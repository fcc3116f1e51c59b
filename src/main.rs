//! Claimflow CLI - insurance ML pipeline runner

use clap::{Parser, Subcommand};
use claimflow::cli;
use claimflow::pipeline::RunStatus;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "claimflow")]
#[command(author, version, about = "Insurance ML pipeline orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one full pipeline run
    Run {
        /// Pipeline configuration file (TOML)
        #[arg(long, short)]
        config: PathBuf,
        /// Directory holding document-store collections
        #[arg(long, default_value = "./data")]
        documents: PathBuf,
        /// Directory backing the model store
        #[arg(long, default_value = "./models")]
        models: PathBuf,
        /// Root directory for per-run artifacts
        #[arg(long, default_value = "./artifacts")]
        artifacts: PathBuf,
    },
    /// Check a pipeline configuration without running anything
    ValidateConfig {
        /// Pipeline configuration file (TOML)
        config: PathBuf,
    },
    /// Predict a single raw row with the deployed model
    Predict {
        /// Directory backing the model store
        #[arg(long, default_value = "./models")]
        models: PathBuf,
        /// Deployed model name
        #[arg(long, short)]
        name: String,
        /// Raw row as a JSON object
        row: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            documents,
            models,
            artifacts,
        } => match cli::handle_run(&config, &documents, &models, &artifacts) {
            Ok(report) => {
                print!("{}", cli::format_report(&report));
                match report.status {
                    RunStatus::Done { .. } => ExitCode::SUCCESS,
                    RunStatus::Failed { .. } => ExitCode::FAILURE,
                }
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },

        Commands::ValidateConfig { config } => match cli::handle_validate_config(&config) {
            Ok(()) => {
                println!("configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },

        Commands::Predict { models, name, row } => {
            match cli::handle_predict(&models, &name, &row) {
                Ok(prediction) => {
                    println!("{prediction}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
