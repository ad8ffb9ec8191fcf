//! Orchestrator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Runtime settings for one orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of download workers started for the run phase.
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// How long the run loop waits for a result before re-checking whether
    /// every job has finished (milliseconds).
    #[serde(default = "default_result_poll_interval")]
    pub result_poll_interval_ms: u64,

    /// Directory downloaded products are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Append job type ids and parameters to status lines.
    #[serde(default)]
    pub verbose: bool,

    /// Render status lines and results with ANSI colour.
    #[serde(default)]
    pub colorize: bool,
}

fn default_download_workers() -> usize {
    4
}

fn default_result_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            download_workers: default_download_workers(),
            result_poll_interval_ms: default_result_poll_interval(),
            output_dir: default_output_dir(),
            verbose: false,
            colorize: false,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            download_workers: config.download_workers,
            result_poll_interval_ms: config.result_poll_ms,
            ..Default::default()
        }
    }
}
