//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hearthd.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use hearth_core::manager::ManagerConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings persistence.
    pub settings: SettingsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Device manager tunables.
    pub manager: ManagerSection,
}

/// Location of the settings file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Path of the JSON settings document.
    pub path: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Device manager tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    /// Interval of the shared periodic timer, in seconds.
    pub timer_interval_secs: u64,
    /// Upper bound on in-flight plugin transactions, in seconds.
    pub transaction_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `hearthd.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hearthd.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HEARTH_SETTINGS_PATH") {
            self.settings.path = val;
        }
        if let Ok(val) = std::env::var("HEARTH_TIMER_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.manager.timer_interval_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("HEARTH_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.manager.timer_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "timer_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.manager.transaction_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "transaction_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.settings.path.is_empty() {
            return Err(ConfigError::Validation(
                "settings path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The manager tunables in their runtime form.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            timer_interval: Duration::from_secs(self.manager.timer_interval_secs),
            transaction_timeout: Duration::from_secs(self.manager.transaction_timeout_secs),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: "hearth-settings.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hearthd=info,hearth_core=info".to_string(),
        }
    }
}

impl Default for ManagerSection {
    fn default() -> Self {
        let defaults = ManagerConfig::default();
        Self {
            timer_interval_secs: defaults.timer_interval.as_secs(),
            transaction_timeout_secs: defaults.transaction_timeout.as_secs(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.settings.path, "hearth-settings.json");
        assert_eq!(config.manager.timer_interval_secs, 15);
        assert_eq!(config.manager.transaction_timeout_secs, 60);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.manager.timer_interval_secs, 15);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [settings]
            path = '/var/lib/hearth/settings.json'

            [logging]
            filter = 'debug'

            [manager]
            timer_interval_secs = 5
            transaction_timeout_secs = 30
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.path, "/var/lib/hearth/settings.json");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.manager.timer_interval_secs, 5);
        assert_eq!(config.manager.transaction_timeout_secs, 30);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [manager]
            timer_interval_secs = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.manager.timer_interval_secs, 5);
        assert_eq!(config.manager.transaction_timeout_secs, 60);
        assert_eq!(config.settings.path, "hearth-settings.json");
    }

    #[test]
    fn should_reject_zero_timer_interval() {
        let mut config = Config::default();
        config.manager.timer_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_empty_settings_path() {
        let mut config = Config::default();
        config.settings.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_convert_to_manager_config() {
        let config = Config::default();
        let manager = config.manager_config();
        assert_eq!(manager.timer_interval, Duration::from_secs(15));
        assert_eq!(manager.transaction_timeout, Duration::from_secs(60));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
