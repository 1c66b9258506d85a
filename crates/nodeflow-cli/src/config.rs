//! CLI configuration.
//!
//! ```text
//! Cli
//! ├── validate <FILE>
//! └── run <FILE> [--param NAME=JSON]... [--max-concurrency N] [--node-timeout-ms MS]
//! ```
//!
//! Engine options can be provided as arguments or environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nodeflow_runtime::engine::{EngineConfig, Parameters};
use nodeflow_runtime::Value;
use serde_json::Value as Json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_STARTUP;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "nodeflow")]
#[command(about = "Validate and run nodeflow graph documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load a graph document and report its size.
    Validate(ValidateArgs),
    /// Load a graph document and execute it once.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Path to the graph document (JSON).
    pub file: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the graph document (JSON).
    pub file: PathBuf,

    /// Run parameter as `name=json`; may be repeated.
    #[arg(long = "param", value_name = "NAME=JSON", value_parser = parse_param)]
    pub params: Vec<(String, Json)>,

    /// Maximum number of nodes computing at the same time.
    #[arg(long, env = "NODEFLOW_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Deadline for a single node computation, in milliseconds.
    #[arg(long, env = "NODEFLOW_NODE_TIMEOUT_MS")]
    pub node_timeout_ms: Option<u64>,
}

impl RunArgs {
    /// Builds the engine configuration from the arguments.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut builder = EngineConfig::builder();
        if let Some(max_concurrency) = self.max_concurrency {
            builder.max_concurrency(max_concurrency);
        }
        if let Some(millis) = self.node_timeout_ms {
            builder.node_timeout(Duration::from_millis(millis));
        }

        let config = builder.build().context("invalid engine configuration")?;
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            max_concurrency = config.max_concurrency,
            node_timeout = ?config.node_timeout,
            "engine configuration"
        );
        Ok(config)
    }

    /// Converts the `--param` arguments into run parameters.
    pub fn parameters(&self) -> Parameters {
        self.params
            .iter()
            .map(|(name, json)| (name.clone(), Value::from_json(json.clone())))
            .collect()
    }
}

impl Cli {
    /// Loads the `.env` file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_param(raw: &str) -> Result<(String, Json), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=JSON, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("parameter name must not be empty".to_owned());
    }

    let value = serde_json::from_str(value)
        .map_err(|err| format!("parameter '{name}' is not valid JSON: {err}"))?;
    Ok((name.to_owned(), value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("limit=10").unwrap(), ("limit".to_owned(), json!(10)));
        assert_eq!(
            parse_param("label=\"a=b\"").unwrap(),
            ("label".to_owned(), json!("a=b"))
        );
        assert!(parse_param("limit").is_err());
        assert!(parse_param("=1").is_err());
        assert!(parse_param("label=bare").is_err());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "nodeflow",
            "run",
            "graph.json",
            "--param",
            "limit=3",
            "--max-concurrency",
            "2",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.engine_config().unwrap().max_concurrency, 2);
        assert_eq!(args.parameters().get("limit").unwrap().get::<i64>(), Ok(3));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let cli =
            Cli::try_parse_from(["nodeflow", "run", "graph.json", "--max-concurrency", "0"]).unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert!(args.engine_config().is_err());
    }
}
