//! Restore Validation Tool
//!
//! Runs AWS Backup restore tests: restores a recovery point, validates the
//! restored resource and records the verdict on the restore job.

// restorecheck/src/main.rs
mod config;
mod errors;
mod restore;
mod utils;
mod validation;

use anyhow::{Context, Result};
use config::AppConfig;
use errors::AppError;
use restore::model::Trigger;
use serde_json::Value;
use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Main entry point for the restore validation tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let log_level = env::var("RESTORECHECK_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(_) => {
            info!("Operation completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "Operation failed");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Exit code for a failed run, taken from the innermost `AppError` if any.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>().map_or(1, AppError::exit_code)
}

async fn run_app() -> Result<()> {
    // config.json is optional; environment variables fill in or override it.
    let config_path = PathBuf::from("config.json");
    let app_config = AppConfig::load(&config_path)
        .context(format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };
    let input_path = args.get(2).map(String::as_str);

    match choice.as_str() {
        "1" | "run" => {
            let trigger: Trigger = match input_path {
                Some(path) => serde_json::from_value(read_json_input(path)?)
                    .context("Trigger must look like {\"recoveryPointArn\"?: string, \"restoreJobId\"?: string}")?,
                None => Trigger::default(),
            };
            let result = restore::run_restore_flow(&app_config, trigger)
                .await
                .context("Restore orchestration failed")?;
            print_json(&result)?;
        }
        "2" | "validate" => {
            let event = read_json_input(input_path.unwrap_or("-"))?;
            let result = validation::run_validate_flow(&app_config, event)
                .await
                .context("Validation failed")?;
            print_json(&result)?;
        }
        "3" | "check-objects" => {
            let event = read_json_input(input_path.unwrap_or("-"))?;
            let result = validation::run_object_check_flow(&app_config, event)
                .await
                .context("Object check failed")?;
            print_json(&result)?;
        }
        _ => {
            anyhow::bail!(
                "Invalid operation choice '{}'. Use 'run', 'validate' or 'check-objects'.",
                choice
            );
        }
    }
    Ok(())
}

/// Reads a JSON document from a file, or from stdin when `path` is `-`.
fn read_json_input(path: &str) -> Result<Value> {
    let raw = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read JSON from stdin")?;
        buffer
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?
    };
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON from {}", path))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Run a restore test (or type 'run')");
    println!("2. Validate a restored resource (or type 'validate')");
    println!("3. Check restored bucket objects (or type 'check-objects')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
