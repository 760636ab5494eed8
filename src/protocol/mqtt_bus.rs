// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection for the bridge.
//!
//! [`MqttBus`] owns a single `rumqttc` client. Its event loop runs on a
//! background task that survives broker outages: on every error it reports
//! [`BusEvent::Disconnected`], waits the reconnect delay and polls again.
//! Command filters are re-subscribed on every `ConnAck`, so a broker restart
//! needs no action from the caller.
//!
//! # Examples
//!
//! ```no_run
//! use vantage_bridge::protocol::{BusEvent, MqttBus};
//!
//! # async fn example() -> vantage_bridge::Result<()> {
//! let (bus, mut events) = MqttBus::builder()
//!     .host("192.168.1.50")
//!     .credentials("user", "password")
//!     .last_will("vantage/bridge/status", "offline")
//!     .subscribe("vantage/light/+/set")
//!     .build()
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let BusEvent::Message { topic, .. } = event {
//!         println!("command on {topic}");
//!     }
//! }
//!
//! bus.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::sync::{mpsc, oneshot};

use super::BusPublisher;
use crate::error::ProtocolError;

/// Capacity of the channel carrying [`BusEvent`]s to the caller.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the client's request queue.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Something that happened on the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker acknowledged a (re)connection.
    Connected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published to.
        topic: String,
        /// Raw payload.
        payload: Vec<u8>,
    },
    /// The connection was lost.
    Disconnected,
}

/// Configuration for an MQTT bus connection.
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
    last_will: Option<(String, String)>,
    subscriptions: Vec<String>,
    client_id_prefix: String,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(10),
            last_will: None,
            subscriptions: Vec::new(),
            client_id_prefix: "vantage-bridge".to_string(),
        }
    }
}

/// A persistent MQTT connection.
///
/// `MqttBus` is cheaply cloneable (via `Arc`); all clones share the same
/// client and connection state.
#[derive(Clone)]
pub struct MqttBus {
    inner: Arc<MqttBusInner>,
}

struct MqttBusInner {
    client: AsyncClient,
    config: MqttBusConfig,
    connected: AtomicBool,
    closing: AtomicBool,
}

impl MqttBus {
    /// Creates a new builder for configuring a bus connection.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Publishes a message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] while the connection is down,
    /// or the client error if the request could not be queued.
    pub async fn publish(
        &self,
        topic: &str,
        payload: String,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        self.inner
            .client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(ProtocolError::Mqtt)
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.closing.store(true, Ordering::Release);
        self.inner.connected.store(false, Ordering::Release);
        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)
    }

    fn subscribe_all(&self) {
        for filter in &self.inner.config.subscriptions {
            match self.inner.client.try_subscribe(filter, QoS::AtLeastOnce) {
                Ok(()) => tracing::debug!(filter = %filter, "Subscribed"),
                Err(e) => tracing::warn!(filter = %filter, error = %e, "Failed to subscribe"),
            }
        }
    }
}

impl BusPublisher for MqttBus {
    fn publish(
        &self,
        topic: &str,
        payload: String,
        qos: QoS,
        retain: bool,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        MqttBus::publish(self, topic, payload, qos, retain)
    }

    fn is_connected(&self) -> bool {
        MqttBus::is_connected(self)
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for an [`MqttBus`].
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    config: MqttBusConfig,
}

impl MqttBusBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets how long [`build`](Self::build) waits for the first `ConnAck`
    /// (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the pause between reconnection attempts (default: 10 seconds).
    #[must_use]
    pub fn reconnect_delay(mut self, duration: Duration) -> Self {
        self.config.reconnect_delay = duration;
        self
    }

    /// Registers a retained QoS 1 last will.
    #[must_use]
    pub fn last_will(mut self, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        self.config.last_will = Some((topic.into(), payload.into()));
        self
    }

    /// Adds a topic filter subscribed on every connection.
    #[must_use]
    pub fn subscribe(mut self, filter: impl Into<String>) -> Self {
        self.config.subscriptions.push(filter.into());
        self
    }

    /// Adds several topic filters.
    #[must_use]
    pub fn subscriptions(mut self, filters: impl IntoIterator<Item = String>) -> Self {
        self.config.subscriptions.extend(filters);
        self
    }

    /// Sets the client id prefix; a random suffix is always appended.
    #[must_use]
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Connects to the broker.
    ///
    /// Returns the bus and the receiver of connection events. The receiver
    /// should be drained continuously; the event loop waits when it is full.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - The first connection attempt fails
    /// - No `ConnAck` arrives within the connection timeout
    pub async fn build(self) -> Result<(MqttBus, mpsc::Receiver<BusEvent>), ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let client_id = format!("{}-{}", self.config.client_id_prefix, &suffix[..8]);

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }
        if let Some((ref topic, ref payload)) = self.config.last_will {
            mqtt_options.set_last_will(LastWill::new(
                topic,
                payload.clone(),
                QoS::AtLeastOnce,
                true,
            ));
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let bus = MqttBus {
            inner: Arc::new(MqttBusInner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }),
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        let bus_clone = bus.clone();
        tokio::spawn(async move {
            handle_bus_events(event_loop, bus_clone, events_tx, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %client_id,
                    "Connected to MQTT broker"
                );
                Ok((bus, events_rx))
            }
            Ok(Ok(Err(message))) => {
                bus.inner.closing.store(true, Ordering::Release);
                Err(ProtocolError::ConnectionFailed(message))
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => {
                bus.inner.closing.store(true, Ordering::Release);
                Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }
}

/// Drives the client event loop until the bus is closed.
///
/// The first connection outcome is reported through `connack_tx`; after that
/// errors only trigger a delayed retry.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    bus: MqttBus,
    events: mpsc::Sender<BusEvent>,
    connack_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                bus.inner.connected.store(true, Ordering::Release);
                bus.subscribe_all();
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Ok(()));
                }
                let _ = events.send(BusEvent::Connected).await;
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(topic = %publish.topic, "MQTT message received");
                let _ = events
                    .send(BusEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    })
                    .await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT event loop stopped");
                break;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => break,
            Err(e) => {
                if bus.inner.closing.load(Ordering::Acquire) {
                    break;
                }
                let was_connected = bus.inner.connected.swap(false, Ordering::AcqRel);
                tracing::error!(error = %e, "MQTT event loop error");

                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Err(e.to_string()));
                    break;
                }
                if was_connected {
                    let _ = events.send(BusEvent::Disconnected).await;
                }
                tokio::time::sleep(bus.inner.config.reconnect_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_default_values() {
        let builder = MqttBusBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert!(builder.config.credentials.is_none());
        assert!(builder.config.last_will.is_none());
        assert!(builder.config.subscriptions.is_empty());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.reconnect_delay, Duration::from_secs(10));
    }

    #[test]
    fn builder_chain() {
        let builder = MqttBusBuilder::default()
            .host("192.168.1.50")
            .port(8883)
            .credentials("admin", "secret")
            .keep_alive(Duration::from_secs(45))
            .reconnect_delay(Duration::from_secs(2))
            .last_will("vantage/bridge/status", "offline")
            .subscribe("vantage/light/+/set")
            .subscriptions(vec!["vantage/light/+/brightness/set".to_string()])
            .client_id_prefix("test");

        assert_eq!(builder.config.host, "192.168.1.50");
        assert_eq!(builder.config.port, 8883);
        assert_eq!(
            builder.config.credentials,
            Some(("admin".to_string(), "secret".to_string()))
        );
        assert_eq!(builder.config.keep_alive, Duration::from_secs(45));
        assert_eq!(builder.config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(
            builder.config.last_will,
            Some(("vantage/bridge/status".to_string(), "offline".to_string()))
        );
        assert_eq!(builder.config.subscriptions.len(), 2);
        assert_eq!(builder.config.client_id_prefix, "test");
    }

    #[tokio::test]
    async fn builder_missing_host_fails() {
        let result = MqttBusBuilder::default().build().await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }
}
