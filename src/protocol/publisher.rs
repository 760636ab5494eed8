// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translation of bridge events into bus messages.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use super::discovery::{
    BridgeIdentity, BridgeStatusConfig, LightConfig, LoadAttributes, RawKeypadPayload,
    TriggerConfig,
};
use super::{BusPublisher, QoS, Topics};
use crate::error::ProtocolError;
use crate::event::BridgeEvent;
use crate::state::{LoadDescriptor, StateUpdate};
use crate::tap::TapEvent;

/// Availability payload while the bridge runs.
pub(crate) const ONLINE: &str = "online";

/// Availability payload after shutdown, also used as last will.
pub(crate) const OFFLINE: &str = "offline";

/// Publishes bridge events on a [`BusPublisher`].
///
/// | Event | Messages |
/// |-------|----------|
/// | `StateUpdated` | state (QoS 0), brightness for dimmable loads (QoS 0) |
/// | `Tap` | raw JSON if enabled, action payload (QoS 0) |
/// | `ControlDiscovered` | trigger config (QoS 1, retained) |
/// | `LoadsDiscovered` | bridge sensor, light config and attributes (QoS 1, retained) |
///
/// Publishing failures are logged and never stop the publisher.
#[derive(Debug)]
pub struct StatePublisher<P> {
    bus: P,
    topics: Topics,
    identity: BridgeIdentity,
    publish_raw: bool,
    published: AtomicU64,
}

impl<P: BusPublisher> StatePublisher<P> {
    /// Creates a publisher. Raw keypad events are published by default.
    #[must_use]
    pub fn new(bus: P, topics: Topics, identity: BridgeIdentity) -> Self {
        Self {
            bus,
            topics,
            identity,
            publish_raw: true,
            published: AtomicU64::new(0),
        }
    }

    /// Enables or disables the raw keypad JSON stream.
    #[must_use]
    pub fn with_raw_events(mut self, enabled: bool) -> Self {
        self.publish_raw = enabled;
        self
    }

    /// Returns the underlying bus.
    #[must_use]
    pub fn bus(&self) -> &P {
        &self.bus
    }

    /// Returns the topic layout.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns how many messages were accepted by the bus so far.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    /// Publishes the messages for one event.
    pub async fn handle(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::StateUpdated(update) => self.publish_state(update).await,
            BridgeEvent::Tap(tap) => self.publish_tap(tap).await,
            BridgeEvent::ControlDiscovered(tap) => self.announce_control(tap).await,
            BridgeEvent::LoadsDiscovered(loads) => self.announce_loads(loads).await,
        }
    }

    /// Publishes events until shutdown is signalled, then drains what is
    /// already queued.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<BridgeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Publisher lagged behind bridge events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            self.handle(&event).await;
        }
    }

    async fn publish_state(&self, update: &StateUpdate) {
        self.send_logged(
            &self.topics.light_state(update.load_id),
            update.power_payload().to_string(),
            QoS::AtMostOnce,
            false,
        )
        .await;

        if let Some(brightness) = update.brightness() {
            self.send_logged(
                &self.topics.brightness_state(update.load_id),
                brightness.to_string(),
                QoS::AtMostOnce,
                false,
            )
            .await;
        }
    }

    async fn publish_tap(&self, tap: &TapEvent) {
        if self.publish_raw {
            self.send_json(
                &self.topics.keypad_raw(),
                &RawKeypadPayload::from(tap),
                QoS::AtMostOnce,
                false,
            )
            .await;
        }

        self.send_logged(
            &self.topics.keypad_action(tap.target(), tap.position),
            tap.action.as_str().to_string(),
            QoS::AtMostOnce,
            false,
        )
        .await;
    }

    async fn announce_control(&self, tap: &TapEvent) {
        let topic =
            self.topics
                .trigger_config(tap.target(), tap.kind, tap.position, tap.action);
        let config = TriggerConfig::for_tap(tap, &self.topics, &self.identity);

        tracing::info!(
            target_id = %tap.target(),
            position = tap.position,
            action = %tap.action,
            "Announcing keypad control"
        );
        self.send_json(&topic, &config, QoS::AtLeastOnce, true).await;
    }

    async fn announce_loads(&self, loads: &[LoadDescriptor]) {
        let status_topic = self
            .topics
            .config("sensor", &self.identity.status_object_id());
        let status = BridgeStatusConfig::new(&self.topics, &self.identity);
        self.send_json(&status_topic, &status, QoS::AtLeastOnce, true)
            .await;

        for load in loads {
            let config = LightConfig::for_load(load, &self.topics, &self.identity);
            self.send_json(
                &self.topics.config("light", &load.object_id),
                &config,
                QoS::AtLeastOnce,
                true,
            )
            .await;
            self.send_json(
                &self.topics.attributes(load.id),
                &LoadAttributes::from(load),
                QoS::AtLeastOnce,
                true,
            )
            .await;
        }

        tracing::info!(loads = loads.len(), "Announced loads");
    }

    // ========================================================================
    // Availability and diagnostics
    // ========================================================================

    /// Publishes `online` (retained) on the availability topic.
    ///
    /// # Errors
    ///
    /// Returns error if the bus rejects the message.
    pub async fn publish_online(&self) -> Result<(), ProtocolError> {
        self.send(
            &self.topics.availability(),
            ONLINE.to_string(),
            QoS::AtLeastOnce,
            true,
        )
        .await
    }

    /// Publishes `offline` (retained) on the availability topic.
    ///
    /// # Errors
    ///
    /// Returns error if the bus rejects the message.
    pub async fn publish_offline(&self) -> Result<(), ProtocolError> {
        self.send(
            &self.topics.availability(),
            OFFLINE.to_string(),
            QoS::AtLeastOnce,
            true,
        )
        .await
    }

    /// Publishes a diagnostic value.
    ///
    /// # Errors
    ///
    /// Returns error if the bus rejects the message.
    pub async fn publish_diagnostic(
        &self,
        name: &str,
        value: String,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        self.send(
            &self.topics.diagnostic(name),
            value,
            QoS::AtMostOnce,
            retain,
        )
        .await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn send(
        &self,
        topic: &str,
        payload: String,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        self.bus.publish(topic, payload, qos, retain).await?;
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn send_logged(&self, topic: &str, payload: String, qos: QoS, retain: bool) {
        if let Err(e) = self.send(topic, payload, qos, retain).await {
            log_failure(topic, &e);
        }
    }

    async fn send_json<T: Serialize>(&self, topic: &str, value: &T, qos: QoS, retain: bool) {
        match serde_json::to_string(value) {
            Ok(payload) => self.send_logged(topic, payload, qos, retain).await,
            Err(e) => log_failure(topic, &ProtocolError::from(e)),
        }
    }
}

fn log_failure(topic: &str, error: &ProtocolError) {
    if matches!(error, ProtocolError::NotConnected) {
        tracing::debug!(topic = %topic, "Bus not connected, message dropped");
    } else {
        tracing::warn!(topic = %topic, error = %error, "Failed to publish");
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use parking_lot::Mutex;

    use super::*;
    use crate::tap::{TapAction, TargetKind};
    use crate::types::Level;

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        topic: String,
        payload: String,
        qos: QoS,
        retain: bool,
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingBus {
        sent: Arc<Mutex<Vec<Sent>>>,
        offline: Arc<AtomicBool>,
    }

    impl RecordingBus {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }

        fn topics(&self) -> Vec<String> {
            self.sent.lock().iter().map(|s| s.topic.clone()).collect()
        }
    }

    impl BusPublisher for RecordingBus {
        fn publish(
            &self,
            topic: &str,
            payload: String,
            qos: QoS,
            retain: bool,
        ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
            let result = if self.offline.load(Ordering::Relaxed) {
                Err(ProtocolError::NotConnected)
            } else {
                self.sent.lock().push(Sent {
                    topic: topic.to_string(),
                    payload,
                    qos,
                    retain,
                });
                Ok(())
            };
            std::future::ready(result)
        }
    }

    fn publisher() -> (StatePublisher<RecordingBus>, RecordingBus) {
        let bus = RecordingBus::default();
        let publisher = StatePublisher::new(
            bus.clone(),
            Topics::default(),
            BridgeIdentity::new("10.0.0.5"),
        );
        (publisher, bus)
    }

    fn tap(action: TapAction) -> TapEvent {
        TapEvent {
            kind: TargetKind::Button,
            vid: 42,
            station_id: 7,
            position: 3,
            action,
            value: i64::from(action == TapAction::Press),
            display_name: "Hall".to_string(),
            area_name: None,
        }
    }

    #[tokio::test]
    async fn dimmable_state_publishes_brightness() {
        let (publisher, bus) = publisher();

        publisher
            .handle(&BridgeEvent::StateUpdated(StateUpdate {
                load_id: 12,
                level: Level::new(50.0).unwrap(),
                is_dimmable: true,
            }))
            .await;

        assert_eq!(
            bus.sent(),
            vec![
                Sent {
                    topic: "vantage/light/12/state".to_string(),
                    payload: "ON".to_string(),
                    qos: QoS::AtMostOnce,
                    retain: false,
                },
                Sent {
                    topic: "vantage/light/12/brightness/state".to_string(),
                    payload: "128".to_string(),
                    qos: QoS::AtMostOnce,
                    retain: false,
                },
            ]
        );
        assert_eq!(publisher.messages_published(), 2);
    }

    #[tokio::test]
    async fn relay_state_publishes_power_only() {
        let (publisher, bus) = publisher();

        publisher
            .handle(&BridgeEvent::StateUpdated(StateUpdate {
                load_id: 4,
                level: Level::MIN,
                is_dimmable: false,
            }))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, "OFF");
    }

    #[tokio::test]
    async fn tap_publishes_raw_and_action() {
        let (publisher, bus) = publisher();

        publisher
            .handle(&BridgeEvent::Tap(tap(TapAction::Press)))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].topic, "vantage/keypad/_raw");
        let raw: serde_json::Value = serde_json::from_str(&sent[0].payload).unwrap();
        assert_eq!(raw["action"], "press");
        assert_eq!(raw["area"], "");
        assert_eq!(sent[1].topic, "vantage/keypad/7/button/3/action");
        assert_eq!(sent[1].payload, "press");
    }

    #[tokio::test]
    async fn raw_stream_can_be_disabled() {
        let bus = RecordingBus::default();
        let publisher = StatePublisher::new(
            bus.clone(),
            Topics::default(),
            BridgeIdentity::new("10.0.0.5"),
        )
        .with_raw_events(false);

        publisher
            .handle(&BridgeEvent::Tap(tap(TapAction::Release)))
            .await;

        assert_eq!(bus.topics(), vec!["vantage/keypad/7/button/3/action"]);
    }

    #[tokio::test]
    async fn control_discovery_is_retained() {
        let (publisher, bus) = publisher();

        publisher
            .handle(&BridgeEvent::ControlDiscovered(tap(TapAction::Press)))
            .await;

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].topic,
            "homeassistant/device_automation/vantage_kp_7_button_3_press/config"
        );
        assert_eq!(sent[0].qos, QoS::AtLeastOnce);
        assert!(sent[0].retain);
    }

    #[tokio::test]
    async fn load_discovery_announces_bridge_and_loads() {
        let (publisher, bus) = publisher();
        let loads = vec![
            LoadDescriptor {
                id: 1,
                name: "Porch".to_string(),
                object_id: "porch".to_string(),
                area_name: "Outside".to_string(),
                is_dimmable: false,
            },
            LoadDescriptor {
                id: 2,
                name: "Den".to_string(),
                object_id: "den".to_string(),
                area_name: "Den".to_string(),
                is_dimmable: true,
            },
        ];

        publisher.handle(&BridgeEvent::LoadsDiscovered(loads)).await;

        assert_eq!(
            bus.topics(),
            vec![
                "homeassistant/sensor/vantage/vantage_controller_10_0_0_5_status/config",
                "homeassistant/light/vantage/porch/config",
                "vantage/light/1/attributes",
                "homeassistant/light/vantage/den/config",
                "vantage/light/2/attributes",
            ]
        );
        assert!(bus.sent().iter().all(|s| s.retain && s.qos == QoS::AtLeastOnce));
    }

    #[tokio::test]
    async fn availability_is_retained() {
        let (publisher, bus) = publisher();

        publisher.publish_online().await.unwrap();
        publisher.publish_offline().await.unwrap();

        let sent = bus.sent();
        assert_eq!(sent[0].payload, "online");
        assert_eq!(sent[1].payload, "offline");
        assert!(sent.iter().all(|s| s.topic == "vantage/bridge/status" && s.retain));
    }

    #[tokio::test]
    async fn disconnected_bus_drops_messages_quietly() {
        let (publisher, bus) = publisher();
        bus.offline.store(true, Ordering::Relaxed);

        publisher
            .handle(&BridgeEvent::Tap(tap(TapAction::Press)))
            .await;

        assert!(bus.sent().is_empty());
        assert_eq!(publisher.messages_published(), 0);
        assert!(matches!(
            publisher.publish_online().await,
            Err(ProtocolError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn run_drains_queued_events_on_shutdown() {
        let (publisher, bus) = publisher();
        let (events_tx, events_rx) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        events_tx
            .send(BridgeEvent::Tap(tap(TapAction::Press)))
            .unwrap();
        shutdown_tx.send(true).unwrap();

        publisher.run(events_rx, shutdown_rx).await;

        assert!(bus.topics().contains(&"vantage/keypad/7/button/3/action".to_string()));
    }
}
