#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;

use std::process;

use tokio_util::sync::CancellationToken;

use crate::config::{Cli, Command};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "nodeflow_cli::startup";
pub const TRACING_TARGET_COMMAND: &str = "nodeflow_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_COMMAND,
            error = %error,
            "command failed"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();
    log_startup_info();

    match cli.command {
        Command::Validate(args) => {
            let summary = command::validate(&args.file).await?;
            println!("{summary}");
        }
        Command::Run(args) => {
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let report = command::run(&args, cancel).await?;
            println!(
                "completed {} execution(s) of {} node(s) in {:?}",
                report.total_runs(),
                report.runs.len(),
                report.elapsed()
            );
        }
    }

    Ok(())
}

/// Cancels the run on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: TRACING_TARGET_COMMAND, "interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

/// Logs startup information.
fn log_startup_info() {
    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        arch = std::env::consts::ARCH,
        os = std::env::consts::OS,
        features = ?enabled_features(),
        "build information"
    );
}

/// Returns a list of enabled compile-time features.
fn enabled_features() -> Vec<&'static str> {
    [cfg!(feature = "dotenv").then_some("dotenv")]
        .into_iter()
        .flatten()
        .collect()
}
