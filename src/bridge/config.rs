// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::{DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_PREFIX, Topics};
use crate::scheduler::SchedulerConfig;
use crate::throttle::DEFAULT_COMMAND_SPACING;

/// Default interval between health reports.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Default MQTT broker host.
pub const DEFAULT_MQTT_HOST: &str = "127.0.0.1";

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default pause between MQTT reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Everything needed to run a bridge.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vantage_bridge::bridge::BridgeConfig;
/// use vantage_bridge::scheduler::SchedulerConfig;
///
/// let config = BridgeConfig::new("192.168.1.20")
///     .with_scheduler(SchedulerConfig::new().with_interval(Duration::from_secs(60)))
///     .with_station_filter([7, 9])
///     .with_mqtt_host("broker.local");
///
/// assert_eq!(config.vantage_host(), "192.168.1.20");
/// assert_eq!(config.topics().availability(), "vantage/bridge/status");
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    vantage_host: String,
    topics: Topics,
    scheduler: SchedulerConfig,
    command_spacing: Duration,
    learn_mode: bool,
    publish_raw: bool,
    include_stations: Vec<u32>,
    health_interval: Duration,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_credentials: Option<(String, String)>,
    reconnect_delay: Duration,
}

impl BridgeConfig {
    /// Creates a configuration with defaults for the given controller host.
    #[must_use]
    pub fn new(vantage_host: impl Into<String>) -> Self {
        Self {
            vantage_host: vantage_host.into(),
            topics: Topics::default(),
            scheduler: SchedulerConfig::default(),
            command_spacing: DEFAULT_COMMAND_SPACING,
            learn_mode: true,
            publish_raw: true,
            include_stations: Vec::new(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
            mqtt_host: DEFAULT_MQTT_HOST.to_string(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_credentials: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `VANTAGE_HOST` is unset, or
    /// [`ConfigError::Invalid`] if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset. Recognized variables:
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VANTAGE_HOST` | required |
    /// | `BASE_TOPIC` | `vantage` |
    /// | `DISCOVERY_PREFIX` | `homeassistant` |
    /// | `POLL_INTERVAL` | 90 (seconds) |
    /// | `POLL_QUIET_TIME` | 5 (seconds) |
    /// | `POLL_SETTLE_TIME` | 5 (seconds) |
    /// | `ENABLE_FALLBACK_POLLING` | `true` |
    /// | `COMMAND_THROTTLE_MS` | 20 |
    /// | `HEALTH_CHECK_INTERVAL` | 30 (seconds) |
    /// | `KEYPAD_STATIONS` | all stations (comma list) |
    /// | `MQTT_HOST` | `127.0.0.1` |
    /// | `MQTT_PORT` | 1883 |
    /// | `MQTT_USERNAME` / `MQTT_PASSWORD` | none |
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let vantage_host = get("VANTAGE_HOST").ok_or(ConfigError::Missing("VANTAGE_HOST"))?;
        let mut config = Self::new(vantage_host.trim());

        config.topics = Topics::new(
            get("BASE_TOPIC").unwrap_or_else(|| DEFAULT_BASE_TOPIC.to_string()),
            get("DISCOVERY_PREFIX").unwrap_or_else(|| DEFAULT_DISCOVERY_PREFIX.to_string()),
        );

        let mut scheduler = config.scheduler.clone();
        if let Some(value) = get("POLL_INTERVAL") {
            scheduler = scheduler.with_interval(parse_secs("POLL_INTERVAL", &value)?);
        }
        if let Some(value) = get("POLL_QUIET_TIME") {
            scheduler = scheduler.with_quiet_time(parse_secs("POLL_QUIET_TIME", &value)?);
        }
        if let Some(value) = get("POLL_SETTLE_TIME") {
            scheduler = scheduler.with_settle_delay(parse_secs("POLL_SETTLE_TIME", &value)?);
        }
        if let Some(value) = get("ENABLE_FALLBACK_POLLING") {
            scheduler = scheduler.with_enabled(parse_bool("ENABLE_FALLBACK_POLLING", &value)?);
        }
        config.scheduler = scheduler;

        if let Some(value) = get("COMMAND_THROTTLE_MS") {
            config.command_spacing =
                Duration::from_millis(parse_number("COMMAND_THROTTLE_MS", &value)?);
        }
        if let Some(value) = get("HEALTH_CHECK_INTERVAL") {
            config.health_interval = parse_secs("HEALTH_CHECK_INTERVAL", &value)?;
        }
        if let Some(value) = get("KEYPAD_STATIONS") {
            config.include_stations = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_number("KEYPAD_STATIONS", s))
                .collect::<Result<_, _>>()?;
        }

        if let Some(host) = get("MQTT_HOST") {
            config.mqtt_host = host;
        }
        if let Some(value) = get("MQTT_PORT") {
            config.mqtt_port = parse_number("MQTT_PORT", &value)?;
        }
        if let Some(username) = get("MQTT_USERNAME") {
            let password = get("MQTT_PASSWORD").unwrap_or_default();
            config.mqtt_credentials = Some((username, password));
        }

        Ok(config)
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Sets the topic layout.
    #[must_use]
    pub fn with_topics(mut self, topics: Topics) -> Self {
        self.topics = topics;
        self
    }

    /// Sets the reconciliation scheduler configuration.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the minimum spacing between controller commands.
    #[must_use]
    pub fn with_command_spacing(mut self, spacing: Duration) -> Self {
        self.command_spacing = spacing;
        self
    }

    /// Enables or disables announcing keypad controls on first use.
    #[must_use]
    pub fn with_learn_mode(mut self, enabled: bool) -> Self {
        self.learn_mode = enabled;
        self
    }

    /// Enables or disables the raw keypad JSON stream.
    #[must_use]
    pub fn with_raw_events(mut self, enabled: bool) -> Self {
        self.publish_raw = enabled;
        self
    }

    /// Restricts keypad button events to these stations. Empty means all.
    #[must_use]
    pub fn with_station_filter(mut self, stations: impl IntoIterator<Item = u32>) -> Self {
        self.include_stations = stations.into_iter().collect();
        self
    }

    /// Sets the health report interval.
    #[must_use]
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Sets the MQTT broker host.
    #[must_use]
    pub fn with_mqtt_host(mut self, host: impl Into<String>) -> Self {
        self.mqtt_host = host.into();
        self
    }

    /// Sets the MQTT broker port.
    #[must_use]
    pub fn with_mqtt_port(mut self, port: u16) -> Self {
        self.mqtt_port = port;
        self
    }

    /// Sets MQTT credentials.
    #[must_use]
    pub fn with_mqtt_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.mqtt_credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the pause between MQTT reconnection attempts.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Returns the controller host.
    #[must_use]
    pub fn vantage_host(&self) -> &str {
        &self.vantage_host
    }

    /// Returns the topic layout.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns the scheduler configuration.
    #[must_use]
    pub fn scheduler(&self) -> &SchedulerConfig {
        &self.scheduler
    }

    /// Returns the command spacing.
    #[must_use]
    pub fn command_spacing(&self) -> Duration {
        self.command_spacing
    }

    /// Returns whether learn mode is on.
    #[must_use]
    pub fn learn_mode(&self) -> bool {
        self.learn_mode
    }

    /// Returns whether raw keypad events are published.
    #[must_use]
    pub fn publish_raw(&self) -> bool {
        self.publish_raw
    }

    /// Returns the station allow-list; empty means all stations.
    #[must_use]
    pub fn include_stations(&self) -> &[u32] {
        &self.include_stations
    }

    /// Returns the health report interval.
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        self.health_interval
    }

    /// Returns the MQTT broker host.
    #[must_use]
    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    /// Returns the MQTT broker port.
    #[must_use]
    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    /// Returns the MQTT credentials, if any.
    #[must_use]
    pub fn mqtt_credentials(&self) -> Option<(&str, &str)> {
        self.mqtt_credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the MQTT reconnect delay.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("{value:?}: {e}"),
        })
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_number(key, value).map(Duration::from_secs)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            message: format!("{value:?} is not a boolean"),
        }),
    }
}
