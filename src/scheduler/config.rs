// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation timing.

use std::time::Duration;

/// Default time between fallback polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(90);

/// Default wait after a press before polling, so scene fades can finish.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Default window after live activity during which polls are skipped.
pub const DEFAULT_QUIET_TIME: Duration = Duration::from_secs(5);

/// Default grace period before the first poll cycle.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);

/// Default time an in-flight poll may keep running after shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Timing of the push/poll reconciliation loop.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vantage_bridge::scheduler::SchedulerConfig;
///
/// let config = SchedulerConfig::default()
///     .with_interval(Duration::from_secs(60))
///     .with_settle_delay(Duration::from_secs(3));
///
/// assert!(config.enabled);
/// assert_eq!(config.quiet_time, Duration::from_secs(5));
///
/// assert!(!SchedulerConfig::disabled().enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Whether fallback polling runs at all.
    pub enabled: bool,
    /// Time between polls when nothing triggers one.
    pub interval: Duration,
    /// Wait between a press and the poll it triggers.
    pub settle_delay: Duration,
    /// Polls are skipped if live activity was seen this recently.
    pub quiet_time: Duration,
    /// Wait before the first cycle.
    pub startup_delay: Duration,
    /// How long an in-flight poll may finish after shutdown.
    pub shutdown_grace: Duration,
}

impl SchedulerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with fallback polling turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Enables or disables fallback polling.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the quiet time.
    #[must_use]
    pub fn with_quiet_time(mut self, quiet_time: Duration) -> Self {
        self.quiet_time = quiet_time;
        self
    }

    /// Sets the startup delay.
    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            quiet_time: DEFAULT_QUIET_TIME,
            startup_delay: DEFAULT_STARTUP_DELAY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}
