// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT bus using mockforge-mqtt.

use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;
use vantage_bridge::ProtocolError;
use vantage_bridge::protocol::{
    BridgeIdentity, BusEvent, BusPublisher, MqttBus, QoS, StatePublisher, Topics,
};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18850);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

fn bus_builder(port: u16) -> vantage_bridge::protocol::MqttBusBuilder {
    let topics = Topics::default();
    MqttBus::builder()
        .host("127.0.0.1")
        .port(port)
        .connection_timeout(Duration::from_secs(5))
        .reconnect_delay(Duration::from_millis(200))
        .last_will(topics.availability(), "offline")
        .subscriptions(topics.command_filters())
}

// ============================================================================
// Connection
// ============================================================================

mod connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = bus_builder(port).build().await;
        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());

        let (bus, mut events) = result.unwrap();
        assert!(bus.is_connected());
        assert_eq!(bus.host(), "127.0.0.1");
        assert_eq!(bus.port(), port);
        assert_eq!(events.recv().await, Some(BusEvent::Connected));
    }

    #[tokio::test]
    async fn connection_refused_fails() {
        // Nothing listens on this port
        let port = get_test_port();

        let result = bus_builder(port).build().await;

        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn missing_host_fails() {
        let result = MqttBus::builder().port(get_test_port()).build().await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn disconnect_marks_bus_down() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let (bus, _events) = bus_builder(port).build().await.unwrap();

        bus.disconnect().await.unwrap();

        assert!(!bus.is_connected());
        let result = bus
            .publish("vantage/bridge/status", "online".to_string(), QoS::AtLeastOnce, true)
            .await;
        assert!(matches!(result, Err(ProtocolError::NotConnected)));
    }
}

// ============================================================================
// Publishing
// ============================================================================

mod publishing {
    use super::*;

    #[tokio::test]
    async fn publish_while_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let (bus, _events) = bus_builder(port).build().await.unwrap();

        let result = BusPublisher::publish(
            &bus,
            "vantage/light/1/state",
            "ON".to_string(),
            QoS::AtMostOnce,
            false,
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn state_publisher_counts_messages() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let (bus, _events) = bus_builder(port).build().await.unwrap();
        let publisher =
            StatePublisher::new(bus.clone(), Topics::default(), BridgeIdentity::new("10.0.0.5"));

        publisher.publish_online().await.unwrap();
        publisher
            .publish_diagnostic("uptime_s", "1".to_string(), false)
            .await
            .unwrap();

        assert_eq!(publisher.messages_published(), 2);
        bus.disconnect().await.unwrap();
    }
}

// NOTE: The mockforge-mqtt broker used for testing doesn't fully support
// pub/sub message forwarding between clients. Inbound command routing is
// covered by unit tests in src/protocol/command.rs and the coordinator tests
// in tests/bridge_flow.rs.
