//! Application-level configuration loading: session timeouts, poll cadence and scoring rules.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{reasons::ReasonCatalog, session::PointCap};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VOLLEY_STATS_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Idle time after which the polled session code is retired.
    pub polling_timeout: Duration,
    /// Idle time after which the push (WebSocket) session code is retired.
    pub push_timeout: Duration,
    /// Interval between two sync client polls.
    pub poll_interval: Duration,
    /// Cap a freshly loaded session starts with.
    pub default_point_cap: PointCap,
    /// Whether an own-side `foul` is credited to a player.
    pub foul_requires_player: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        polling_timeout_secs = config.polling_timeout.as_secs(),
                        push_timeout_secs = config.push_timeout.as_secs(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document. Missing keys keep their defaults; an unsupported cap falls back
    /// to 25 with a warning.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Reason catalog honouring the configured attribution rules.
    pub fn catalog(&self) -> ReasonCatalog {
        ReasonCatalog::new(self.foul_requires_player)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    polling_timeout_secs: u64,
    push_timeout_secs: u64,
    poll_interval_ms: u64,
    default_point_cap: u32,
    foul_requires_player: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            polling_timeout_secs: 300,
            push_timeout_secs: 30,
            poll_interval_ms: 2_000,
            default_point_cap: 25,
            foul_requires_player: true,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let default_point_cap = PointCap::try_from(value.default_point_cap).unwrap_or_else(|err| {
            warn!(error = %err, "unsupported default point cap; using 25");
            PointCap::TwentyFive
        });
        Self {
            polling_timeout: Duration::from_secs(value.polling_timeout_secs),
            push_timeout: Duration::from_secs(value.push_timeout_secs),
            poll_interval: Duration::from_millis(value.poll_interval_ms),
            default_point_cap,
            foul_requires_player: value.foul_requires_player,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.polling_timeout, Duration::from_secs(300));
        assert_eq!(config.push_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(2_000));
        assert_eq!(config.default_point_cap, PointCap::TwentyFive);
        assert!(config.foul_requires_player);
    }

    #[test]
    fn partial_documents_keep_other_defaults() {
        let config =
            AppConfig::from_json(r#"{ "push_timeout_secs": 10, "foul_requires_player": false }"#)
                .unwrap();
        assert_eq!(config.push_timeout, Duration::from_secs(10));
        assert_eq!(config.polling_timeout, Duration::from_secs(300));
        assert!(!config.catalog().foul_requires_player);
    }

    #[test]
    fn unsupported_cap_falls_back_to_twenty_five() {
        let config = AppConfig::from_json(r#"{ "default_point_cap": 21 }"#).unwrap();
        assert_eq!(config.default_point_cap, PointCap::TwentyFive);
        let config = AppConfig::from_json(r#"{ "default_point_cap": 15 }"#).unwrap();
        assert_eq!(config.default_point_cap, PointCap::Fifteen);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }
}
