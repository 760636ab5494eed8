// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant MQTT discovery payloads.
//!
//! Each load becomes a `light` entity grouped under its own device, and
//! every keypad control that has been pressed becomes a device trigger. All
//! devices hang off a bridge device that carries the availability sensor.

use serde::Serialize;

use super::Topics;
use crate::state::LoadDescriptor;
use crate::tap::{TapAction, TapEvent};

/// Manufacturer reported for controller devices.
const MANUFACTURER: &str = "Vantage";

/// Manufacturer reported for keypad devices.
const KEYPAD_MANUFACTURER: &str = "Legrand Vantage";

/// Identity of the controller this bridge serves.
///
/// Unique ids and device identifiers are derived from the controller host so
/// several bridges can share one Home Assistant instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeIdentity {
    host: String,
    host_safe: String,
}

impl BridgeIdentity {
    /// Creates the identity for a controller host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let host_safe = host.replace('.', "_");
        Self { host, host_safe }
    }

    /// Returns the controller host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the device identifier of the bridge itself.
    #[must_use]
    pub fn device_id(&self) -> String {
        format!("vantage_controller_{}", self.host_safe)
    }

    /// Returns the object id of the bridge status sensor.
    #[must_use]
    pub fn status_object_id(&self) -> String {
        format!("{}_status", self.device_id())
    }

    fn load_device_id(&self, load_id: u32) -> String {
        format!("vantage_{}_load_{load_id}", self.host_safe)
    }

    fn load_unique_id(&self, load_id: u32) -> String {
        format!("vantage_{}_load_{load_id}_light", self.host)
    }
}

/// Device block shared by all discovery payloads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable identifiers.
    pub identifiers: Vec<String>,
    /// Display name.
    pub name: String,
    /// Manufacturer.
    pub manufacturer: String,
    /// Model.
    pub model: String,
    /// Area hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,
    /// Parent device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_device: Option<String>,
    /// Software version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

/// Discovery config for a load.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LightConfig {
    /// Entity name.
    pub name: String,
    /// Unique entity id.
    pub unique_id: String,
    /// On/off state topic.
    pub state_topic: String,
    /// On/off command topic.
    pub command_topic: String,
    /// Brightness state topic, dimmable loads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_state_topic: Option<String>,
    /// Brightness command topic, dimmable loads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_command_topic: Option<String>,
    /// Brightness scale, dimmable loads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_scale: Option<u16>,
    /// Attributes topic.
    pub json_attributes_topic: String,
    /// Bridge availability topic.
    pub availability_topic: String,
    /// Owning device.
    pub device: DeviceInfo,
}

impl LightConfig {
    /// Builds the config for a discovered load.
    #[must_use]
    pub fn for_load(load: &LoadDescriptor, topics: &Topics, identity: &BridgeIdentity) -> Self {
        let dimmable = load.is_dimmable;
        Self {
            name: load.name.clone(),
            unique_id: identity.load_unique_id(load.id),
            state_topic: topics.light_state(load.id),
            command_topic: topics.light_set(load.id),
            brightness_state_topic: dimmable.then(|| topics.brightness_state(load.id)),
            brightness_command_topic: dimmable.then(|| topics.brightness_set(load.id)),
            brightness_scale: dimmable.then_some(255),
            json_attributes_topic: topics.attributes(load.id),
            availability_topic: topics.availability(),
            device: DeviceInfo {
                identifiers: vec![identity.load_device_id(load.id)],
                name: load.name.clone(),
                manufacturer: MANUFACTURER.to_string(),
                model: "InFusion Load".to_string(),
                suggested_area: Some(load.area_name.clone()),
                via_device: Some(identity.device_id()),
                sw_version: None,
            },
        }
    }
}

/// Descriptive attributes published for each load.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadAttributes {
    /// Area name.
    pub vantage_area: String,
    /// Controller id.
    pub vantage_id: u32,
    /// Controller name.
    pub vantage_name: String,
}

impl From<&LoadDescriptor> for LoadAttributes {
    fn from(load: &LoadDescriptor) -> Self {
        Self {
            vantage_area: load.area_name.clone(),
            vantage_id: load.id,
            vantage_name: load.name.clone(),
        }
    }
}

/// Discovery config for the bridge availability sensor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BridgeStatusConfig {
    /// Entity name.
    pub name: String,
    /// Suggested entity id.
    pub default_entity_id: String,
    /// Unique entity id.
    pub unique_id: String,
    /// Availability topic, used as state.
    pub state_topic: String,
    /// Icon.
    pub icon: String,
    /// Bridge device.
    pub device: DeviceInfo,
    /// Entity category.
    pub entity_category: String,
}

impl BridgeStatusConfig {
    /// Builds the bridge sensor config.
    #[must_use]
    pub fn new(topics: &Topics, identity: &BridgeIdentity) -> Self {
        let device_id = identity.device_id();
        Self {
            name: "Bridge Status".to_string(),
            default_entity_id: format!("sensor.{}", identity.status_object_id()),
            unique_id: format!("{device_id}_status_sensor"),
            state_topic: topics.availability(),
            icon: "mdi:bridge".to_string(),
            device: DeviceInfo {
                identifiers: vec![device_id],
                name: format!("Vantage Controller ({})", identity.host()),
                manufacturer: MANUFACTURER.to_string(),
                model: "InFusion (SDK) Bridge".to_string(),
                suggested_area: None,
                via_device: None,
                sw_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            entity_category: "diagnostic".to_string(),
        }
    }
}

/// Discovery config for a keypad device trigger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Always `device_automation`.
    pub platform: String,
    /// Always `trigger`.
    pub automation_type: String,
    /// `button_short_press` or `button_short_release`.
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// `<kind>_<position>`.
    pub subtype: String,
    /// Action topic.
    pub topic: String,
    /// Payload that fires the trigger.
    pub payload: String,
    /// Keypad device.
    pub device: DeviceInfo,
}

impl TriggerConfig {
    /// Builds the trigger config for a keypad control.
    #[must_use]
    pub fn for_tap(event: &TapEvent, topics: &Topics, identity: &BridgeIdentity) -> Self {
        let trigger_type = match event.action {
            TapAction::Press => "button_short_press",
            TapAction::Release => "button_short_release",
        };
        let kind = event.kind.as_str();

        Self {
            platform: "device_automation".to_string(),
            automation_type: "trigger".to_string(),
            trigger_type: trigger_type.to_string(),
            subtype: format!("{kind}_{}", event.position),
            topic: topics.keypad_action(event.target(), event.position),
            payload: event.action.as_str().to_string(),
            device: DeviceInfo {
                identifiers: vec![format!("vantage_kp_{}", event.target())],
                name: event.display_name.clone(),
                manufacturer: KEYPAD_MANUFACTURER.to_string(),
                model: format!("Vantage {}", capitalize(kind)),
                suggested_area: event.area_name.clone(),
                via_device: Some(identity.device_id()),
                sw_version: None,
            },
        }
    }
}

/// Raw keypad event published for every tap.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RawKeypadPayload {
    /// `button` or `task`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Device display name.
    pub name: String,
    /// Area name, empty when unknown.
    pub area: String,
    /// Source object id.
    pub id: u32,
    /// Control position.
    pub pos: u32,
    /// `press` or `release`.
    pub action: String,
    /// Raw reported value.
    pub val: i64,
}

impl From<&TapEvent> for RawKeypadPayload {
    fn from(event: &TapEvent) -> Self {
        Self {
            kind: event.kind.as_str().to_string(),
            name: event.display_name.clone(),
            area: event.area_name.clone().unwrap_or_default(),
            id: event.vid,
            pos: event.position,
            action: event.action.as_str().to_string(),
            val: event.value,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tap::TargetKind;

    fn identity() -> BridgeIdentity {
        BridgeIdentity::new("192.168.1.20")
    }

    fn load(is_dimmable: bool) -> LoadDescriptor {
        LoadDescriptor {
            id: 12,
            name: "Kitchen Pendants".to_string(),
            object_id: "kitchen_pendants".to_string(),
            area_name: "Kitchen".to_string(),
            is_dimmable,
        }
    }

    fn press() -> TapEvent {
        TapEvent {
            kind: TargetKind::Button,
            vid: 42,
            station_id: 7,
            position: 3,
            action: TapAction::Press,
            value: 1,
            display_name: "Kitchen Door".to_string(),
            area_name: Some("Kitchen".to_string()),
        }
    }

    #[test]
    fn identity_ids() {
        let identity = identity();
        assert_eq!(identity.device_id(), "vantage_controller_192_168_1_20");
        assert_eq!(identity.status_object_id(), "vantage_controller_192_168_1_20_status");
    }

    #[test]
    fn dimmable_light_config() {
        let config = LightConfig::for_load(&load(true), &Topics::default(), &identity());
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(
            value,
            json!({
                "name": "Kitchen Pendants",
                "unique_id": "vantage_192.168.1.20_load_12_light",
                "state_topic": "vantage/light/12/state",
                "command_topic": "vantage/light/12/set",
                "brightness_state_topic": "vantage/light/12/brightness/state",
                "brightness_command_topic": "vantage/light/12/brightness/set",
                "brightness_scale": 255,
                "json_attributes_topic": "vantage/light/12/attributes",
                "availability_topic": "vantage/bridge/status",
                "device": {
                    "identifiers": ["vantage_192_168_1_20_load_12"],
                    "name": "Kitchen Pendants",
                    "manufacturer": "Vantage",
                    "model": "InFusion Load",
                    "suggested_area": "Kitchen",
                    "via_device": "vantage_controller_192_168_1_20"
                }
            })
        );
    }

    #[test]
    fn relay_light_config_has_no_brightness() {
        let config = LightConfig::for_load(&load(false), &Topics::default(), &identity());
        let value = serde_json::to_value(&config).unwrap();

        assert!(value.get("brightness_state_topic").is_none());
        assert!(value.get("brightness_command_topic").is_none());
        assert!(value.get("brightness_scale").is_none());
    }

    #[test]
    fn load_attributes() {
        let value = serde_json::to_value(LoadAttributes::from(&load(true))).unwrap();
        assert_eq!(
            value,
            json!({"vantage_area": "Kitchen", "vantage_id": 12, "vantage_name": "Kitchen Pendants"})
        );
    }

    #[test]
    fn bridge_status_config() {
        let config = BridgeStatusConfig::new(&Topics::default(), &identity());
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["unique_id"], "vantage_controller_192_168_1_20_status_sensor");
        assert_eq!(
            value["default_entity_id"],
            "sensor.vantage_controller_192_168_1_20_status"
        );
        assert_eq!(value["state_topic"], "vantage/bridge/status");
        assert_eq!(value["entity_category"], "diagnostic");
        assert_eq!(value["device"]["name"], "Vantage Controller (192.168.1.20)");
        assert!(value["device"]["sw_version"].is_string());
    }

    #[test]
    fn trigger_config() {
        let config = TriggerConfig::for_tap(&press(), &Topics::default(), &identity());
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(
            value,
            json!({
                "platform": "device_automation",
                "automation_type": "trigger",
                "type": "button_short_press",
                "subtype": "button_3",
                "topic": "vantage/keypad/7/button/3/action",
                "payload": "press",
                "device": {
                    "identifiers": ["vantage_kp_7"],
                    "name": "Kitchen Door",
                    "manufacturer": "Legrand Vantage",
                    "model": "Vantage Button",
                    "suggested_area": "Kitchen",
                    "via_device": "vantage_controller_192_168_1_20"
                }
            })
        );
    }

    #[test]
    fn release_trigger_for_task() {
        let mut event = press();
        event.kind = TargetKind::Task;
        event.station_id = 0;
        event.vid = 300;
        event.position = 300;
        event.action = TapAction::Release;
        event.area_name = None;

        let value =
            serde_json::to_value(TriggerConfig::for_tap(&event, &Topics::default(), &identity()))
                .unwrap();

        assert_eq!(value["type"], "button_short_release");
        assert_eq!(value["subtype"], "task_300");
        assert_eq!(value["device"]["identifiers"], json!(["vantage_kp_task_300"]));
        assert_eq!(value["device"]["model"], "Vantage Task");
        assert!(value["device"].get("suggested_area").is_none());
    }

    #[test]
    fn raw_keypad_payload() {
        let value = serde_json::to_value(RawKeypadPayload::from(&press())).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "button",
                "name": "Kitchen Door",
                "area": "Kitchen",
                "id": 42,
                "pos": 3,
                "action": "press",
                "val": 1
            })
        );
    }
}
