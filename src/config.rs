//! Monitor configuration parameters
//!
//! All tunable parameters for the monitor.  Values come from the process
//! environment (optionally seeded from a `.env` file) and fall back to the
//! defaults below.  Every loaded config is validated before use.

use core::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::AlertDirection;
use crate::app::ports::ChannelId;

/// Prefix shared by every recognised environment variable.
pub const ENV_PREFIX: &str = "THERMOWATCH_";

/// Default sysfs node of the kernel `dht11` IIO driver.
pub const DEFAULT_IIO_PATH: &str = "/sys/bus/iio/devices/iio:device0/in_temp_input";

/// Where temperature samples come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// Linux IIO sysfs attribute reporting millidegrees Celsius.
    Iio(PathBuf),
    /// Synthetic readings for hosts without hardware.
    Simulated,
}

/// Core monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    // --- Chat ---
    /// Bot API token for the chat transport
    pub api_key: String,
    /// Channel allowed to issue commands; also receives threshold alerts
    pub authorized_channel_id: ChannelId,
    /// Channel receiving critical failure escalations
    pub error_channel_id: ChannelId,

    // --- Alerts ---
    /// Threshold (Celsius) that triggers a notification
    pub alert_threshold_celsius: f64,
    /// Which side of the threshold alerts
    pub alert_direction: AlertDirection,
    /// Minimum spacing between threshold notifications
    pub notification_cooldown: Duration,
    /// Minimum spacing between failure escalations
    pub escalation_cooldown: Duration,

    // --- Timing ---
    /// Sampling tick interval
    pub sample_interval: Duration,
    /// How often the series is written to disk
    pub persist_interval: Duration,
    /// How often the retention window is enforced
    pub trim_interval: Duration,
    /// Maximum age of a retained reading
    pub retention_window: Duration,
    /// Maximum age of an inbound command before it is ignored
    pub staleness_threshold: Duration,
    /// Wait between attempts after a transient sensor error
    pub sensor_retry_backoff: Duration,
    /// Wait before re-polling after a transport failure
    pub reconnect_backoff: Duration,

    // --- Validation ---
    /// Lowest reading accepted as physically plausible (Celsius)
    pub plausible_min_celsius: f64,
    /// Highest reading accepted as physically plausible (Celsius)
    pub plausible_max_celsius: f64,

    // --- Files ---
    /// Persisted series
    pub data_file: PathBuf,
    /// Durable log, sent on `log` and with escalations
    pub log_file: PathBuf,
    /// Sensor backend
    pub sensor: SensorSource,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            // Chat
            api_key: String::new(),
            authorized_channel_id: 0,
            error_channel_id: 0,

            // Alerts
            alert_threshold_celsius: 30.0,
            alert_direction: AlertDirection::Above,
            notification_cooldown: Duration::from_secs(60 * 60), // 1 h
            escalation_cooldown: Duration::from_secs(6 * 60 * 60), // 6 h

            // Timing
            sample_interval: Duration::from_secs(5),
            persist_interval: Duration::from_secs(60),
            trim_interval: Duration::from_secs(60 * 60),
            retention_window: Duration::from_secs(5 * 7 * 24 * 60 * 60), // 5 weeks
            staleness_threshold: Duration::from_secs(5),
            sensor_retry_backoff: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(3),

            // Validation (DHT11-class sensors)
            plausible_min_celsius: -40.0,
            plausible_max_celsius: 80.0,

            // Files
            data_file: PathBuf::from("thermowatch.csv"),
            log_file: PathBuf::from("thermowatch.log"),
            sensor: SensorSource::Iio(PathBuf::from(DEFAULT_IIO_PATH)),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { key: &'static str, value: String },
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{ENV_PREFIX}{key} is not set"),
            Self::Invalid { key, value } => write!(f, "{ENV_PREFIX}{key} has invalid value '{value}'"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl MonitorConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup (full variable names).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);
        let defaults = Self::default();

        let api_key = vars.get("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        let authorized_channel_id = vars
            .parse("AUTHORIZED_CHANNEL_ID")?
            .ok_or(ConfigError::Missing("AUTHORIZED_CHANNEL_ID"))?;

        let sensor = match vars.get("SENSOR") {
            None => defaults.sensor,
            Some(s) if s == "sim" => SensorSource::Simulated,
            Some(s) => match s.strip_prefix("iio:") {
                Some(path) if !path.is_empty() => SensorSource::Iio(PathBuf::from(path)),
                _ => return Err(ConfigError::Invalid { key: "SENSOR", value: s }),
            },
        };

        let config = Self {
            api_key,
            authorized_channel_id,
            error_channel_id: vars.parse("ERROR_CHANNEL_ID")?.unwrap_or(authorized_channel_id),
            alert_threshold_celsius: vars
                .parse("ALERT_THRESHOLD_CELSIUS")?
                .unwrap_or(defaults.alert_threshold_celsius),
            alert_direction: vars.parse("ALERT_DIRECTION")?.unwrap_or(defaults.alert_direction),
            notification_cooldown: vars
                .secs("NOTIFICATION_COOLDOWN_SECS")?
                .unwrap_or(defaults.notification_cooldown),
            escalation_cooldown: vars
                .secs("ESCALATION_COOLDOWN_SECS")?
                .unwrap_or(defaults.escalation_cooldown),
            sample_interval: vars.secs("SAMPLE_INTERVAL_SECS")?.unwrap_or(defaults.sample_interval),
            persist_interval: vars.secs("PERSIST_INTERVAL_SECS")?.unwrap_or(defaults.persist_interval),
            trim_interval: vars.secs("TRIM_INTERVAL_SECS")?.unwrap_or(defaults.trim_interval),
            retention_window: vars.secs("RETENTION_WINDOW_SECS")?.unwrap_or(defaults.retention_window),
            staleness_threshold: vars
                .secs("STALENESS_THRESHOLD_SECS")?
                .unwrap_or(defaults.staleness_threshold),
            sensor_retry_backoff: vars
                .secs("SENSOR_RETRY_SECS")?
                .unwrap_or(defaults.sensor_retry_backoff),
            reconnect_backoff: vars
                .secs("RECONNECT_BACKOFF_SECS")?
                .unwrap_or(defaults.reconnect_backoff),
            plausible_min_celsius: vars
                .parse("PLAUSIBLE_MIN_CELSIUS")?
                .unwrap_or(defaults.plausible_min_celsius),
            plausible_max_celsius: vars
                .parse("PLAUSIBLE_MAX_CELSIUS")?
                .unwrap_or(defaults.plausible_max_celsius),
            data_file: vars.get("DATA_FILE").map_or(defaults.data_file, PathBuf::from),
            log_file: vars.get("LOG_FILE").map_or(defaults.log_file, PathBuf::from),
            sensor,
        };

        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("api_key must not be empty"));
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ValidationFailed("sample_interval must be > 0"));
        }
        if self.persist_interval.is_zero() {
            return Err(ConfigError::ValidationFailed("persist_interval must be > 0"));
        }
        if self.trim_interval.is_zero() {
            return Err(ConfigError::ValidationFailed("trim_interval must be > 0"));
        }
        if self.retention_window < Duration::from_secs(60 * 60) {
            return Err(ConfigError::ValidationFailed("retention_window must be at least 1 h"));
        }
        if self.trim_interval > self.retention_window {
            return Err(ConfigError::ValidationFailed(
                "trim_interval must not exceed retention_window",
            ));
        }
        if self.staleness_threshold.is_zero() {
            return Err(ConfigError::ValidationFailed("staleness_threshold must be > 0"));
        }
        if !self.plausible_min_celsius.is_finite()
            || !self.plausible_max_celsius.is_finite()
            || self.plausible_min_celsius >= self.plausible_max_celsius
        {
            return Err(ConfigError::ValidationFailed(
                "plausible_min_celsius must be below plausible_max_celsius",
            ));
        }
        if !(self.plausible_min_celsius..=self.plausible_max_celsius)
            .contains(&self.alert_threshold_celsius)
        {
            return Err(ConfigError::ValidationFailed(
                "alert_threshold_celsius must lie inside the plausible range",
            ));
        }
        Ok(())
    }

    /// Retention window in whole hours (at least 1); the largest chart span.
    pub fn retention_hours(&self) -> u32 {
        u32::try_from(self.retention_window.as_secs() / 3600)
            .unwrap_or(u32::MAX)
            .max(1)
    }

    /// JSON dump for the startup log with the API key masked.
    pub fn redacted_json(&self) -> String {
        let mut shown = self.clone();
        shown.api_key = "***".to_string();
        serde_json::to_string(&shown).unwrap_or_else(|e| format!("<unserialisable config: {e}>"))
    }
}

/// Prefix-aware accessor over a variable lookup.
struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{ENV_PREFIX}{key}")).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: core::str::FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { key, value: raw }),
        }
    }

    fn secs(&self, key: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_secs))
    }
}
