//! Configuration for the Naily agent.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the fact file location
pub const FACT_FILE_ENV: &str = "NAILY_FACT_FILE";

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unix socket path for IPC
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// The fact file backing the store
    #[serde(default = "default_fact_file")]
    pub fact_file: PathBuf,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on a single action invocation, in seconds
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(naily_ipc::DEFAULT_SOCKET_PATH)
}

fn default_fact_file() -> PathBuf {
    PathBuf::from("/etc/naily.facts")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/naily-agent.pid")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_action_timeout_secs() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            fact_file: default_fact_file(),
            pid_file: default_pid_file(),
            log_level: default_log_level(),
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

impl AgentConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("naily")
            .join("config.yaml")
    }

    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_path();

        let config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load config file: {}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.with_env_overrides()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply `NAILY_FACT_FILE` if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(FACT_FILE_ENV).filter(|p| !p.is_empty()) {
            self.fact_file = PathBuf::from(path);
        }
        self
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}
