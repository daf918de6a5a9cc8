//! Configuration module for the clipper application.
//!
//! Configuration is loaded from environment variables using the figment
//! crate. Duration-valued keys accept both numeric values (interpreted as
//! seconds) and duration strings with units ("500ms", "30s", "2m").

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level for this application's target specifically.
    ///
    /// e.g. "debug" behaves like "warn,clipper=debug". Valid values are
    /// "trace", "debug", "info", "warn", "error". Defaults to "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Listen address for the REST/WebSocket server (default: 0.0.0.0)
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Listen port for the REST/WebSocket server (default: 8000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Number of scrape workers to spawn (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Cap on per-task retries before an article is marked FAILED
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Base delay `b` for the `b * 2^n` retry back-off
    #[serde(
        default = "default_retry_base_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_base_delay: Duration,
    /// Upper bound on the retry back-off delay
    #[serde(
        default = "default_retry_max_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_max_delay: Duration,
    /// Per-URL scrape deadline
    #[serde(
        default = "default_scrape_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub scrape_timeout: Duration,
    /// Worker idle sleep when all lanes are empty
    #[serde(
        default = "default_consumer_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub consumer_poll_interval: Duration,
    /// Observer keep-alive cadence
    #[serde(
        default = "default_ws_heartbeat_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub ws_heartbeat_interval: Duration,
    /// Graceful shutdown timeout
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_host: default_api_host(),
            api_port: default_api_port(),
            database_url: default_database_url(),
            worker_count: default_worker_count(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_delay: default_retry_base_delay(),
            retry_max_delay: default_retry_max_delay(),
            scrape_timeout: default_scrape_timeout(),
            consumer_poll_interval: default_consumer_poll_interval(),
            ws_heartbeat_interval: default_ws_heartbeat_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_database_url() -> String {
    "sqlite://clipper.db".to_string()
}

fn default_worker_count() -> usize {
    4
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_scrape_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_consumer_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_ws_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Duration parser with seconds as the default unit.
///
/// Supports milliseconds (ms), seconds (s), and minutes (m); allows
/// whitespace between the number and the unit and multiple summed units
/// ("1m 30s" = 90 seconds).
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[TimeUnit::MilliSecond, TimeUnit::Second, TimeUnit::Minute])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Deserializer for duration fields accepting both numbers and strings.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            DURATION_PARSER
                .parse(value)
                .map_err(|e| {
                    serde::de::Error::custom(format!(
                        "invalid duration '{}': {}. Examples: '5' (5 seconds), '500ms', '30s', '2m'",
                        value, e
                    ))
                })?
                .try_into()
                .map_err(|e| serde::de::Error::custom(format!("duration conversion error: {}", e)))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value < 0 {
                return Err(serde::de::Error::custom("duration cannot be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
