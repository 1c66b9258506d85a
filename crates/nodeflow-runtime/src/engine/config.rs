//! Engine configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for graph execution.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of nodes computing at the same time.
    #[builder(default = "default_concurrency()")]
    pub max_concurrency: usize,

    /// Deadline for a single node computation.
    #[builder(default, setter(strip_option))]
    pub node_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Returns a builder for the configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_concurrency {
            if max == 0 {
                return Err("max_concurrency must be at least 1".into());
            }
        }
        if let Some(Some(timeout)) = self.node_timeout {
            if timeout.is_zero() {
                return Err("node_timeout must be greater than zero".into());
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            node_timeout: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}
