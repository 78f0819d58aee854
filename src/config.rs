use crate::counter::Direction;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from counter.toml.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CounterConfig {
    pub agent: AgentConfig,
    pub render: RenderConfig,
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub tick_ms: u64,
    pub start_value: i64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub max_retries: u32,
    pub ack_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WatchdogConfig {
    pub enabled: bool,
    pub deadline_ms: u64,
}

// --- Default implementations ---

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            start_value: 0,
            direction: Direction::Up,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            ack_timeout_ms: 1000,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deadline_ms: 10_000,
        }
    }
}

impl AgentConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl RenderConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

impl WatchdogConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl CounterConfig {
    /// Load config from `path`. A missing file yields the defaults.
    ///
    /// Not validated here: CLI overrides are applied first, then the caller
    /// runs `validate()` on the merged result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.tick_ms == 0 {
            return Err(ConfigError::Invalid("agent.tick_ms must be > 0".to_string()));
        }
        if self.render.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "render.ack_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.watchdog.enabled && self.watchdog.deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog.deadline_ms must be > 0 when the watchdog is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_timing() {
        let config = CounterConfig::default();
        assert_eq!(config.agent.tick(), Duration::from_millis(100));
        assert_eq!(config.watchdog.deadline(), Duration::from_secs(10));
        assert!(config.watchdog.enabled);
        assert_eq!(config.agent.direction, Direction::Up);
        assert_eq!(config.render.max_retries, 2);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = CounterConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, CounterConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.toml");
        std::fs::write(
            &path,
            r#"
[agent]
tick_ms = 50
direction = "down"

[watchdog]
deadline_ms = 500
"#,
        )
        .unwrap();

        let config = CounterConfig::load(&path).unwrap();
        assert_eq!(config.agent.tick_ms, 50);
        assert_eq!(config.agent.direction, Direction::Down);
        assert_eq!(config.agent.start_value, 0);
        assert_eq!(config.watchdog.deadline_ms, 500);
        assert!(config.watchdog.enabled);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_parse_error_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.toml");
        std::fs::write(&path, "[agent]\ntick_ms = \"fast\"\n").unwrap();

        let err = CounterConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("counter.toml"));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.toml");
        std::fs::write(&path, "[agent]\ntick_ms = 0\n").unwrap();

        let config = CounterConfig::load(&path).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_deadline_allowed_when_watchdog_disabled() {
        let mut config = CounterConfig::default();
        config.watchdog.deadline_ms = 0;
        assert!(config.validate().is_err());
        config.watchdog.enabled = false;
        assert!(config.validate().is_ok());
    }
}
