//! Configuration types for berth

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Scheduling pass configuration
    pub scheduler: SchedulerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    ///
    /// The result is not validated; callers apply their overrides first and
    /// then call [`DaemonConfig::validate`].
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::BerthError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::BerthError::Config(format!("Failed to read config file: {}", e))
        })?;
        let config: DaemonConfig = toml::from_str(&content)
            .map_err(|e| crate::BerthError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<(), crate::BerthError> {
        if self.scheduler.interval_secs == 0 {
            return Err(crate::BerthError::Config(
                "scheduler.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.pass_budget_ms == Some(0) {
            return Err(crate::BerthError::Config(
                "scheduler.pass_budget_ms must be greater than zero when set".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(crate::BerthError::Config(format!(
                "unknown log format '{}', expected text or json",
                other
            ))),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub address: String,
    /// Port for the REST API server
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Scheduling pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between timer-triggered passes
    pub interval_secs: u64,
    /// Wall-clock budget for a single pass; unbounded when unset
    pub pass_budget_ms: Option<u64>,
    /// Run one pass as soon as the timer starts
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            pass_budget_ms: None,
            run_on_startup: true,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pass_budget(&self) -> Option<Duration> {
        self.pass_budget_ms.map(Duration::from_millis)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log format (json or text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
