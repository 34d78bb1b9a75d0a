//! Configuration management for taskmesh.
//!
//! Configuration can be set via environment variables:
//! - `MAX_REPLAN_ATTEMPTS` - Optional. Replan ceiling per engine run. Defaults to `3`.
//! - `STEP_TIMEOUT_SECONDS` - Optional. Per-step tool deadline. Defaults to `300`.
//! - `LLM_TIMEOUT_SECONDS` - Optional. Deadline for a single model call. Defaults to `120`.
//! - `DELEGATION_TIMEOUT_SECONDS` - Optional. Remote delegation deadline. Defaults to `300`.
//! - `ANALYZER_RETRIES` - Optional. Quick retries before the analyzer falls back. Defaults to `1`.
//! - `WORKSPACE_PATH` - Optional. Root for file tools. Defaults to current directory.
//! - `DEVICE_ID` - Optional. Identity of this device in collaborations. Defaults to `local`.
//! - `LOG_LEVEL` - Optional. Default log level when `RUST_LOG` is unset. Defaults to `info`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Per-engine execution limits.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum number of replans after the first execution pass
    pub max_replan_attempts: u32,

    /// Deadline for a single step's tool call
    pub step_timeout: Duration,

    /// Deadline for a single model invocation
    pub llm_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_replan_attempts: 3,
            step_timeout: Duration::from_secs(300),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum replans per engine run
    pub max_replan_attempts: u32,

    /// Per-step tool deadline
    pub step_timeout: Duration,

    /// Per-call model deadline
    pub llm_timeout: Duration,

    /// Deadline for a delegated task to be answered
    pub delegation_timeout: Duration,

    /// Retries the task analyzer performs before using its default analysis
    pub analyzer_retries: u32,

    /// Workspace directory for file operations
    pub workspace_path: PathBuf,

    /// Identity of this device when collaborating
    pub device_id: String,

    /// Default log filter level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            max_replan_attempts: engine.max_replan_attempts,
            step_timeout: engine.step_timeout,
            llm_timeout: engine.llm_timeout,
            delegation_timeout: Duration::from_secs(300),
            analyzer_retries: 1,
            workspace_path: PathBuf::from("."),
            device_id: "local".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_replan_attempts =
            parse_env("MAX_REPLAN_ATTEMPTS")?.unwrap_or(defaults.max_replan_attempts);

        let step_timeout = parse_env::<u64>("STEP_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.step_timeout);

        let llm_timeout = parse_env::<u64>("LLM_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.llm_timeout);

        let delegation_timeout = parse_env::<u64>("DELEGATION_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.delegation_timeout);

        let analyzer_retries = parse_env("ANALYZER_RETRIES")?.unwrap_or(defaults.analyzer_retries);

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let device_id = std::env::var("DEVICE_ID").unwrap_or(defaults.device_id);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            max_replan_attempts,
            step_timeout,
            llm_timeout,
            delegation_timeout,
            analyzer_retries,
            workspace_path,
            device_id,
            log_level,
        })
    }

    /// Create a config rooted at a workspace (useful for testing).
    pub fn new(workspace_path: PathBuf) -> Self {
        Self {
            workspace_path,
            ..Self::default()
        }
    }

    /// Engine limits derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_replan_attempts: self.max_replan_attempts,
            step_timeout: self.step_timeout,
            llm_timeout: self.llm_timeout,
        }
    }
}

fn parse_env<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}
