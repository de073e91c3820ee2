//! Layered settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `RABBITWATCH_*` environment variables (nested keys separated by
//! `__`, e.g. `RABBITWATCH_HEARTBEAT__INTERVAL=10s`), then command-line
//! overrides.
//!
//! Durations are written as strings such as `"15s"` or `"500ms"`.
//!
//! ```toml
//! [api]
//! base_url = "http://monitor.internal:3001"
//!
//! [transport]
//! preference = "sse"
//!
//! [heartbeat]
//! interval = "10s"
//! timeout = "25s"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use rabbitwatch_types::TransportPreference;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid duration '{0}' (expected e.g. \"15s\", \"500ms\")")]
    Duration(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
];

/// Parse duration strings like "15s", "2.5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str
                .trim()
                .parse()
                .map_err(|_| ConfigError::Duration(s.to_string()))?;
            if !val.is_finite() || val < 0.0 {
                return Err(ConfigError::Duration(s.to_string()));
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    Err(ConfigError::Duration(s.to_string()))
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn preference<'de, D>(deserializer: D) -> Result<TransportPreference, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Backend endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiSettings {
    /// HTTP base URL of the monitoring backend.
    pub base_url: String,
    pub health_path: String,
    pub topology_path: String,
    pub sse_path: String,
    pub ws_path: String,
    #[serde(deserialize_with = "duration")]
    pub request_timeout: Duration,
}

/// Transport choice and the adapters' own socket retry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransportSettings {
    #[serde(deserialize_with = "preference")]
    pub preference: TransportPreference,
    /// Whether the backend serves WebSocket; decides `auto`.
    pub websocket_available: bool,
    #[serde(deserialize_with = "duration")]
    pub retry_interval: Duration,
    pub retry_attempts: u32,
    /// Pause between tearing down and reconnecting on a preference change.
    #[serde(deserialize_with = "duration")]
    pub switch_delay: Duration,
}

/// Outer reconnection backoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReconnectSettings {
    #[serde(deserialize_with = "duration")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(deserialize_with = "duration")]
    pub max_delay: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(deserialize_with = "duration")]
    pub interval: Duration,
    /// Silence after which the link is considered dead.
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
}

/// Presentation cache windows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetentionSettings {
    #[serde(deserialize_with = "duration")]
    pub metrics_ttl: Duration,
    #[serde(deserialize_with = "duration")]
    pub metrics_sweep: Duration,
    #[serde(deserialize_with = "duration")]
    pub flows_ttl: Duration,
    #[serde(deserialize_with = "duration")]
    pub flows_sweep: Duration,
    pub max_flows: usize,
}

/// Complete runtime settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub transport: TransportSettings,
    pub reconnect: ReconnectSettings,
    pub heartbeat: HeartbeatSettings,
    pub retention: RetentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: "http://localhost:3001".to_string(),
                health_path: "/api/health".to_string(),
                topology_path: "/api/rabbitmq/topology".to_string(),
                sse_path: "/api/events".to_string(),
                ws_path: "/ws".to_string(),
                request_timeout: Duration::from_secs(10),
            },
            transport: TransportSettings {
                preference: TransportPreference::Auto,
                websocket_available: true,
                retry_interval: Duration::from_secs(5),
                retry_attempts: 5,
                switch_delay: Duration::from_secs(1),
            },
            reconnect: ReconnectSettings {
                base_delay: Duration::from_secs(5),
                multiplier: 2.0,
                max_delay: Duration::from_secs(30),
                max_attempts: 5,
            },
            heartbeat: HeartbeatSettings {
                interval: Duration::from_secs(15),
                timeout: Duration::from_secs(30),
            },
            retention: RetentionSettings {
                metrics_ttl: Duration::from_secs(30),
                metrics_sweep: Duration::from_secs(10),
                flows_ttl: Duration::from_secs(5),
                flows_sweep: Duration::from_secs(2),
                max_flows: 50,
            },
        }
    }
}

/// Command-line values that win over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub preference: Option<String>,
}

impl Settings {
    /// Load settings from defaults, `file`, the environment and `overrides`.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // api
            .set_default("api.base_url", "http://localhost:3001")?
            .set_default("api.health_path", "/api/health")?
            .set_default("api.topology_path", "/api/rabbitmq/topology")?
            .set_default("api.sse_path", "/api/events")?
            .set_default("api.ws_path", "/ws")?
            .set_default("api.request_timeout", "10s")?
            // transport
            .set_default("transport.preference", "auto")?
            .set_default("transport.websocket_available", true)?
            .set_default("transport.retry_interval", "5s")?
            .set_default("transport.retry_attempts", 5)?
            .set_default("transport.switch_delay", "1s")?
            // reconnect
            .set_default("reconnect.base_delay", "5s")?
            .set_default("reconnect.multiplier", 2.0)?
            .set_default("reconnect.max_delay", "30s")?
            .set_default("reconnect.max_attempts", 5)?
            // heartbeat
            .set_default("heartbeat.interval", "15s")?
            .set_default("heartbeat.timeout", "30s")?
            // retention
            .set_default("retention.metrics_ttl", "30s")?
            .set_default("retention.metrics_sweep", "10s")?
            .set_default("retention.flows_ttl", "5s")?
            .set_default("retention.flows_sweep", "2s")?
            .set_default("retention.max_flows", 50)?;

        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("RABBITWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.base_url", overrides.base_url.clone())?
            .set_override_option("transport.preference", overrides.preference.clone())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_zero(key: &'static str, value: Duration) -> Result<(), ConfigError> {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }

        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "api.base_url",
                reason: format!("'{}' is not an http(s) URL", self.api.base_url),
            });
        }

        non_zero("api.request_timeout", self.api.request_timeout)?;
        non_zero("transport.retry_interval", self.transport.retry_interval)?;
        non_zero("reconnect.base_delay", self.reconnect.base_delay)?;
        non_zero("heartbeat.interval", self.heartbeat.interval)?;
        non_zero("heartbeat.timeout", self.heartbeat.timeout)?;
        non_zero("retention.metrics_sweep", self.retention.metrics_sweep)?;
        non_zero("retention.flows_sweep", self.retention.flows_sweep)?;

        if self.transport.retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "transport.retry_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "reconnect.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.reconnect.multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                key: "reconnect.multiplier",
                reason: format!("{} is below 1", self.reconnect.multiplier),
            });
        }
        if self.reconnect.max_delay < self.reconnect.base_delay {
            return Err(ConfigError::Invalid {
                key: "reconnect.max_delay",
                reason: "must not be shorter than reconnect.base_delay".to_string(),
            });
        }
        if self.retention.max_flows == 0 {
            return Err(ConfigError::Invalid {
                key: "retention.max_flows",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_seconds() {
        let d = parse_duration("2.5s").unwrap();
        assert_eq!(d, Duration::from_millis(2500));
    }

    #[test]
    fn test_parse_milliseconds() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(" 750ms ").unwrap(), Duration::from_millis(750));
    }

    #[test]
    fn test_parse_microseconds() {
        let d = parse_duration("16µs").unwrap();
        assert_eq!(d.as_nanos(), 16_000);
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_duration("15"), Err(ConfigError::Duration(_))));
        assert!(matches!(parse_duration("fast"), Err(ConfigError::Duration(_))));
        assert!(matches!(parse_duration("-3s"), Err(ConfigError::Duration(_))));
    }

    #[test]
    fn defaults_load_and_validate() {
        let settings = Settings::load(None, &Overrides::default()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.reconnect.max_attempts, 5);
        assert_eq!(settings.heartbeat.interval, Duration::from_secs(15));
        assert_eq!(settings.retention.max_flows, 50);
    }

    #[test]
    fn file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "http://from-file:3001"

[transport]
preference = "sse"
websocket_available = false

[heartbeat]
interval = "10s"
timeout = "25s"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path()), &Overrides::default()).unwrap();
        assert_eq!(settings.api.base_url, "http://from-file:3001");
        assert_eq!(settings.transport.preference, TransportPreference::Sse);
        assert!(!settings.transport.websocket_available);
        assert_eq!(settings.heartbeat.timeout, Duration::from_secs(25));
        // Untouched sections keep their defaults.
        assert_eq!(settings.reconnect.max_delay, Duration::from_secs(30));

        let overrides = Overrides {
            base_url: Some("https://from-cli".to_string()),
            preference: Some("WS".to_string()),
        };
        let settings = Settings::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(settings.api.base_url, "https://from-cli");
        assert_eq!(settings.transport.preference, TransportPreference::WebSocket);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            Settings::load(Some(&path), &Overrides::default()),
            Err(ConfigError::Source(_))
        ));
    }

    #[test]
    fn bad_duration_in_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[heartbeat]\ninterval = \"soon\"").unwrap();
        assert!(Settings::load(Some(file.path()), &Overrides::default()).is_err());
    }

    #[test]
    fn validation_catches_unusable_values() {
        let mut settings = Settings::default();
        settings.reconnect.max_attempts = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { key: "reconnect.max_attempts", .. })
        ));

        let mut settings = Settings::default();
        settings.reconnect.multiplier = 0.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.heartbeat.interval = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.base_url = "localhost:3001".to_string();
        assert!(settings.validate().is_err());
    }
}
