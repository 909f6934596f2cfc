//! Configuration model.
//!
//! Every field has a default so an empty (or missing) `taskdeck.toml` yields a
//! runnable configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskdeckError};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_level: String,
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub broadcast: BroadcastConfig,
    pub status: StatusConfig,
    pub executor: ExecutorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            broadcast: BroadcastConfig::default(),
            status: StatusConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.orchestrator.max_concurrent_tasks == 0 {
            return Err(TaskdeckError::config(
                "orchestrator.max_concurrent_tasks must be at least 1",
            ));
        }
        if self.status.refresh_interval_secs == 0 {
            return Err(TaskdeckError::config(
                "status.refresh_interval_secs must be at least 1",
            ));
        }
        if self.status.error_backoff_secs == 0 {
            return Err(TaskdeckError::config(
                "status.error_backoff_secs must be at least 1",
            ));
        }
        if self.broadcast.subscriber_buffer == 0 {
            return Err(TaskdeckError::config(
                "broadcast.subscriber_buffer must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrent remote-executor calls.
    pub max_concurrent_tasks: usize,
    /// Interval between progress updates of a running task.
    pub progress_tick_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            progress_tick_ms: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Per-subscriber outbound queue length; a full queue drops the subscriber.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    pub refresh_interval_secs: u64,
    pub error_backoff_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            error_backoff_secs: 10,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    #[default]
    DryRun,
    Ssh,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    /// Simulated latency of the dry-run executor.
    pub dry_run_latency_ms: u64,
    pub ssh: SshConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::DryRun,
            dry_run_latency_ms: 500,
            ssh: SshConfig::default(),
        }
    }
}

/// Connection settings for the SSH executor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SshConfig {
    pub program: String,
    /// `user@host` passed to ssh.
    pub destination: String,
    pub identity_file: Option<PathBuf>,
    /// Options placed before the destination (e.g. `-o BatchMode=yes`).
    pub extra_args: Vec<String>,
    /// Remote command; the instruction is appended as its last argument.
    pub remote_command: String,
    pub timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            destination: "pi@raspberrypi.local".to_string(),
            identity_file: dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa")),
            extra_args: vec!["-o".to_string(), "BatchMode=yes".to_string()],
            remote_command: "sudo /tmp/hid_executor.sh".to_string(),
            timeout_secs: 30,
        }
    }
}
