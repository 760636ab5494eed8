// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composition of the bridge.
//!
//! [`BridgeCoordinator`] ties the keypad tap, the state cache, the
//! reconciliation scheduler and the command throttler together and reports
//! everything as [`BridgeEvent`](crate::event::BridgeEvent)s.
//! [`run_mqtt_bridge`] connects those events to an MQTT broker.

mod config;
mod coordinator;
mod health;
mod runner;

pub use config::{
    BridgeConfig, DEFAULT_HEALTH_INTERVAL, DEFAULT_MQTT_HOST, DEFAULT_MQTT_PORT,
    DEFAULT_RECONNECT_DELAY,
};
pub use coordinator::{BridgeCoordinator, BridgeIo};
pub use health::{HealthReport, run_health_loop};
pub use runner::run_mqtt_bridge;
