// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT side of the bridge.
//!
//! - [`Topics`]: the topic layout
//! - [`LoadCommand`]: parsing of inbound command messages
//! - [`discovery`]: Home Assistant discovery payloads
//! - [`MqttBus`]: the broker connection
//! - [`StatePublisher`]: turns [`BridgeEvent`](crate::event::BridgeEvent)s
//!   into bus messages
//!
//! The publisher only depends on the [`BusPublisher`] trait, so it can be
//! driven against an in-memory bus in tests.

mod command;
pub mod discovery;
mod mqtt_bus;
mod publisher;
mod topics;

use std::future::Future;

pub use command::{CommandKind, LoadCommand};
pub use discovery::BridgeIdentity;
pub use mqtt_bus::{BusEvent, MqttBus, MqttBusBuilder, MqttBusConfig};
pub(crate) use publisher::OFFLINE;
pub use publisher::StatePublisher;
pub use rumqttc::QoS;
pub use topics::{DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_PREFIX, Topics};

use crate::error::ProtocolError;

/// Outbound side of a message bus.
pub trait BusPublisher: Send + Sync + 'static {
    /// Publishes `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] while the bus is down, or the
    /// transport error otherwise.
    fn publish(
        &self,
        topic: &str,
        payload: String,
        qos: QoS,
        retain: bool,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Returns whether the bus is currently connected.
    fn is_connected(&self) -> bool {
        true
    }
}
