//! Configuration for keystroke telemetry.

use crate::core::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const APP_DIR: &str = "keystroke-telemetry";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Duration of each aggregation window
    #[serde(with = "duration_serde")]
    pub window_duration: Duration,

    /// Inactivity and suspicion thresholds used when scoring
    pub scoring: ScoringPolicy,

    /// Path for the local window store and transparency log
    pub data_path: PathBuf,

    /// Base URL of the telemetry server, if windows should leave this machine
    pub gateway_url: Option<String>,

    /// Bearer token sent with every gateway request
    pub gateway_token: Option<String>,

    /// IANA timezone stamped on submitted records
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            window_duration: Duration::from_secs(60),
            scoring: ScoringPolicy::default(),
            data_path: data_dir,
            gateway_url: None,
            gateway_token: None,
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_path.join("windows.json")
    }

    pub fn transparency_path(&self) -> PathBuf {
        self.data_path.join("transparency.json")
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        chrono_tz::Tz::from_str(&self.timezone)
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone `{}`", self.timezone)))
    }

    /// Client settings for the gateway at `base_url`, carrying the configured token.
    #[cfg(feature = "gateway")]
    pub fn gateway_config(&self, base_url: impl Into<String>) -> crate::gateway::GatewayConfig {
        let config = crate::gateway::GatewayConfig::new(base_url);
        match self.gateway_token {
            Some(ref token) => config.with_token(token.clone()),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "window_duration must be at least one second".to_string(),
            ));
        }
        if !self.scoring.suspicion_threshold.is_finite() || self.scoring.suspicion_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "suspicion_threshold must be a non-negative number".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_duration, Duration::from_secs(60));
        assert_eq!(config.scoring.inactivity_threshold, 10);
        assert_eq!(config.scoring.suspicion_threshold, 1.2);
        assert!(config.gateway_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"window_duration": 30, "scoring": {"inactivity_threshold": 5, "suspicion_threshold": 2.0}}"#,
        )
        .unwrap();
        assert_eq!(config.window_duration, Duration::from_secs(30));
        assert_eq!(config.scoring.inactivity_threshold, 5);
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.json");

        let config = Config {
            gateway_url: Some("http://127.0.0.1:8080".into()),
            timezone: "America/La_Paz".into(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert!(Config::load_from(&dir.path().join("missing.json")).is_ok());
    }

    #[cfg(feature = "gateway")]
    #[test]
    fn test_gateway_config_carries_token() {
        let config: Config =
            serde_json::from_str(r#"{"gateway_url": "http://127.0.0.1:8080", "gateway_token": "s3cret"}"#)
                .unwrap();
        let gateway = config.gateway_config("http://127.0.0.1:8080");
        assert_eq!(gateway.token.as_deref(), Some("s3cret"));

        assert!(Config::default().gateway_config("http://x").token.is_none());
    }

    #[test]
    fn test_validation() {
        let bad_tz = Config {
            timezone: "Mars/Olympus".into(),
            ..Config::default()
        };
        assert!(matches!(bad_tz.validate(), Err(ConfigError::Invalid(_))));

        let zero_window = Config {
            window_duration: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(zero_window.validate(), Err(ConfigError::Invalid(_))));
    }
}
