// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic layout.
//!
//! All bridge topics live under a configurable base (default `vantage`);
//! Home Assistant discovery configs live under the discovery prefix
//! (default `homeassistant`).
//!
//! | Purpose | Topic |
//! |---------|-------|
//! | Availability | `<base>/bridge/status` |
//! | Load state | `<base>/light/<id>/state` |
//! | Load command | `<base>/light/<id>/set` |
//! | Brightness state | `<base>/light/<id>/brightness/state` |
//! | Brightness command | `<base>/light/<id>/brightness/set` |
//! | Load attributes | `<base>/light/<id>/attributes` |
//! | Raw keypad events | `<base>/keypad/_raw` |
//! | Keypad actions | `<base>/keypad/<target>/button/<pos>/action` |
//! | Diagnostics | `<base>/diagnostics/<name>` |
//! | Entity config | `<prefix>/<component>/<base>/<object_id>/config` |
//! | Trigger config | `<prefix>/device_automation/vantage_kp_<target>_<kind>_<pos>_<action>/config` |

use crate::tap::{TapAction, TargetId, TargetKind};

/// Default base topic.
pub const DEFAULT_BASE_TOPIC: &str = "vantage";

/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Builds every topic the bridge publishes or subscribes to.
///
/// # Examples
///
/// ```
/// use vantage_bridge::protocol::Topics;
///
/// let topics = Topics::default();
/// assert_eq!(topics.availability(), "vantage/bridge/status");
/// assert_eq!(topics.light_state(12), "vantage/light/12/state");
/// assert_eq!(
///     topics.config("light", "kitchen"),
///     "homeassistant/light/vantage/kitchen/config"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    discovery_prefix: String,
}

impl Topics {
    /// Creates a topic layout. Trailing slashes are ignored.
    #[must_use]
    pub fn new(base: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            base: trim_slashes(base.into()),
            discovery_prefix: trim_slashes(discovery_prefix.into()),
        }
    }

    /// Returns the base topic.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the discovery prefix.
    #[must_use]
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// Bridge availability (`online`/`offline`).
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/bridge/status", self.base)
    }

    /// On/off state of a load.
    #[must_use]
    pub fn light_state(&self, load_id: u32) -> String {
        format!("{}/light/{load_id}/state", self.base)
    }

    /// On/off command for a load.
    #[must_use]
    pub fn light_set(&self, load_id: u32) -> String {
        format!("{}/light/{load_id}/set", self.base)
    }

    /// Brightness state of a load.
    #[must_use]
    pub fn brightness_state(&self, load_id: u32) -> String {
        format!("{}/light/{load_id}/brightness/state", self.base)
    }

    /// Brightness command for a load.
    #[must_use]
    pub fn brightness_set(&self, load_id: u32) -> String {
        format!("{}/light/{load_id}/brightness/set", self.base)
    }

    /// Descriptive attributes of a load.
    #[must_use]
    pub fn attributes(&self, load_id: u32) -> String {
        format!("{}/light/{load_id}/attributes", self.base)
    }

    /// Subscription filter matching every on/off command.
    #[must_use]
    pub fn light_set_filter(&self) -> String {
        format!("{}/light/+/set", self.base)
    }

    /// Subscription filter matching every brightness command.
    #[must_use]
    pub fn brightness_set_filter(&self) -> String {
        format!("{}/light/+/brightness/set", self.base)
    }

    /// Both command filters.
    #[must_use]
    pub fn command_filters(&self) -> Vec<String> {
        vec![self.light_set_filter(), self.brightness_set_filter()]
    }

    /// Raw JSON keypad events.
    #[must_use]
    pub fn keypad_raw(&self) -> String {
        format!("{}/keypad/_raw", self.base)
    }

    /// Press/release actions of one keypad control.
    #[must_use]
    pub fn keypad_action(&self, target: TargetId, position: u32) -> String {
        format!("{}/keypad/{target}/button/{position}/action", self.base)
    }

    /// A diagnostic value.
    #[must_use]
    pub fn diagnostic(&self, name: &str) -> String {
        format!("{}/diagnostics/{name}", self.base)
    }

    /// Home Assistant config for an entity.
    #[must_use]
    pub fn config(&self, component: &str, object_id: &str) -> String {
        format!(
            "{}/{component}/{}/{object_id}/config",
            self.discovery_prefix, self.base
        )
    }

    /// Home Assistant config for a keypad device trigger.
    #[must_use]
    pub fn trigger_config(
        &self,
        target: TargetId,
        kind: TargetKind,
        position: u32,
        action: TapAction,
    ) -> String {
        format!(
            "{}/device_automation/vantage_kp_{target}_{kind}_{position}_{action}/config",
            self.discovery_prefix
        )
    }

    /// Splits a command topic into load id and the command suffix.
    ///
    /// Returns `None` for topics outside `<base>/light/` or with a
    /// non-numeric id.
    pub(crate) fn split_light_topic<'a>(&self, topic: &'a str) -> Option<(u32, &'a str)> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix("/light/")?;
        let (id, suffix) = rest.split_once('/')?;
        Some((id.parse().ok()?, suffix))
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_PREFIX)
    }
}

fn trim_slashes(mut topic: String) -> String {
    while topic.ends_with('/') {
        topic.pop();
    }
    topic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_topics() {
        let topics = Topics::default();
        assert_eq!(topics.light_set(5), "vantage/light/5/set");
        assert_eq!(topics.brightness_state(5), "vantage/light/5/brightness/state");
        assert_eq!(topics.brightness_set(5), "vantage/light/5/brightness/set");
        assert_eq!(topics.attributes(5), "vantage/light/5/attributes");
    }

    #[test]
    fn command_filters() {
        let topics = Topics::new("home/vantage", "ha");
        assert_eq!(
            topics.command_filters(),
            vec![
                "home/vantage/light/+/set".to_string(),
                "home/vantage/light/+/brightness/set".to_string()
            ]
        );
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let topics = Topics::new("vantage/", "homeassistant//");
        assert_eq!(topics.availability(), "vantage/bridge/status");
        assert_eq!(
            topics.config("sensor", "x"),
            "homeassistant/sensor/vantage/x/config"
        );
    }

    #[test]
    fn keypad_topics() {
        let topics = Topics::default();
        assert_eq!(topics.keypad_raw(), "vantage/keypad/_raw");
        assert_eq!(
            topics.keypad_action(TargetId::Station(7), 3),
            "vantage/keypad/7/button/3/action"
        );
        assert_eq!(
            topics.keypad_action(TargetId::Virtual(300), 300),
            "vantage/keypad/task_300/button/300/action"
        );
    }

    #[test]
    fn trigger_config_topic() {
        let topics = Topics::default();
        assert_eq!(
            topics.trigger_config(TargetId::Station(7), TargetKind::Button, 3, TapAction::Press),
            "homeassistant/device_automation/vantage_kp_7_button_3_press/config"
        );
        assert_eq!(
            topics.trigger_config(
                TargetId::Virtual(300),
                TargetKind::Task,
                300,
                TapAction::Release
            ),
            "homeassistant/device_automation/vantage_kp_task_300_task_300_release/config"
        );
    }

    #[test]
    fn diagnostic_topic() {
        assert_eq!(
            Topics::default().diagnostic("uptime_s"),
            "vantage/diagnostics/uptime_s"
        );
    }

    #[test]
    fn split_light_topic() {
        let topics = Topics::default();
        assert_eq!(topics.split_light_topic("vantage/light/12/set"), Some((12, "set")));
        assert_eq!(
            topics.split_light_topic("vantage/light/12/brightness/set"),
            Some((12, "brightness/set"))
        );
        assert_eq!(topics.split_light_topic("vantage/light/abc/set"), None);
        assert_eq!(topics.split_light_topic("other/light/12/set"), None);
        assert_eq!(topics.split_light_topic("vantagex/light/12/set"), None);
    }
}
