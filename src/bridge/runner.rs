// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end wiring of a bridge on an MQTT broker.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::health::run_health_loop;
use super::{BridgeConfig, BridgeCoordinator, BridgeIo};
use crate::controller::Controller;
use crate::error::Result;
use crate::event::EventBus;
use crate::protocol::{
    BridgeIdentity, BusEvent, LoadCommand, MqttBus, OFFLINE, StatePublisher, Topics,
};
use crate::tap::LineStream;

/// Capacity of the queue between the bus and the command task.
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Runs a complete bridge until `shutdown` is signalled.
///
/// Connects to the broker with an `offline` last will, discovers the
/// controller, announces every load and then runs the coordinator, the
/// publisher, the command dispatcher and the health loop side by side.
/// After a broker reconnect everything is announced again. On shutdown
/// `offline` is published and the connection closed.
///
/// # Errors
///
/// Returns error if the broker cannot be reached or the initial discovery
/// fails.
///
/// # Examples
///
/// ```no_run
/// # use vantage_bridge::controller::Controller;
/// use vantage_bridge::bridge::{BridgeConfig, run_mqtt_bridge};
/// use vantage_bridge::tap::line_channel;
///
/// # async fn example(controller: impl Controller) -> vantage_bridge::Result<()> {
/// let config = BridgeConfig::from_env()?;
/// let (_sink, lines) = line_channel();
/// let (stop, shutdown) = tokio::sync::watch::channel(false);
///
/// tokio::spawn(async move {
///     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
///     let _ = stop.send(true);
/// });
///
/// run_mqtt_bridge(controller, config, lines, shutdown).await
/// # }
/// ```
pub async fn run_mqtt_bridge<C: Controller>(
    controller: C,
    config: BridgeConfig,
    lines: LineStream,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let topics = config.topics().clone();

    let mut builder = MqttBus::builder()
        .host(config.mqtt_host())
        .port(config.mqtt_port())
        .reconnect_delay(config.reconnect_delay())
        .last_will(topics.availability(), OFFLINE)
        .subscriptions(topics.command_filters());
    if let Some((username, password)) = config.mqtt_credentials() {
        builder = builder.credentials(username, password);
    }
    let (bus, bus_events) = builder.build().await?;

    let events = EventBus::new();
    let publisher = Arc::new(
        StatePublisher::new(
            bus.clone(),
            topics.clone(),
            BridgeIdentity::new(config.vantage_host()),
        )
        .with_raw_events(config.publish_raw()),
    );
    let coordinator = Arc::new(BridgeCoordinator::new(controller, &config, events.clone()));

    let (stop_tx, stop_rx) = watch::channel(false);

    let publisher_task = {
        let publisher = Arc::clone(&publisher);
        let receiver = events.subscribe();
        let stop = stop_rx.clone();
        tokio::spawn(async move { publisher.run(receiver, stop).await })
    };

    if let Err(e) = publisher.publish_online().await {
        tracing::warn!(error = %e, "Failed to publish availability");
    }

    if let Err(e) = coordinator.rediscover().await {
        tracing::error!(error = %e, "Initial discovery failed");
        let _ = stop_tx.send(true);
        let _ = publisher_task.await;
        close(&publisher, &bus).await;
        return Err(e.into());
    }

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

    let dispatcher_task = {
        let publisher = Arc::clone(&publisher);
        let coordinator = Arc::clone(&coordinator);
        let stop = stop_rx.clone();
        tokio::spawn(async move {
            dispatch_bus_events(bus_events, &topics, &publisher, &coordinator, command_tx, stop)
                .await;
        })
    };

    let health_task = {
        let publisher = Arc::clone(&publisher);
        let coordinator = Arc::clone(&coordinator);
        let interval = config.health_interval();
        let stop = stop_rx.clone();
        tokio::spawn(async move {
            run_health_loop(&publisher, &coordinator, interval, stop).await;
        })
    };

    let coordinator_task = tokio::spawn(Arc::clone(&coordinator).run(
        BridgeIo {
            lines,
            commands: command_rx,
        },
        stop_rx,
    ));

    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }

    tracing::info!("Shutting down bridge");
    let _ = stop_tx.send(true);

    for (name, task) in [
        ("coordinator", coordinator_task),
        ("dispatcher", dispatcher_task),
        ("health", health_task),
        ("publisher", publisher_task),
    ] {
        if let Err(e) = task.await {
            tracing::warn!(task = name, error = %e, "Task ended abnormally");
        }
    }

    close(&publisher, &bus).await;
    Ok(())
}

/// Routes inbound bus traffic: commands to the coordinator, reconnects to a
/// re-announcement.
async fn dispatch_bus_events<C: Controller>(
    mut bus_events: mpsc::Receiver<BusEvent>,
    topics: &Topics,
    publisher: &StatePublisher<MqttBus>,
    coordinator: &BridgeCoordinator<C>,
    commands: mpsc::Sender<LoadCommand>,
    mut stop: watch::Receiver<bool>,
) {
    // The connection that build() waited for is already announced
    let mut initial_connect = true;

    loop {
        let event = tokio::select! {
            event = bus_events.recv() => event,
            _ = stop.changed() => break,
        };

        match event {
            Some(BusEvent::Connected) if initial_connect => initial_connect = false,
            Some(BusEvent::Connected) => {
                tracing::info!("Broker reconnected, re-announcing");
                if let Err(e) = publisher.publish_online().await {
                    tracing::warn!(error = %e, "Failed to publish availability");
                }
                coordinator.reannounce();
            }
            Some(BusEvent::Message { topic, payload }) => {
                match LoadCommand::parse(topics, &topic, &payload) {
                    Some(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    None => tracing::debug!(topic = %topic, "Ignoring unrecognized message"),
                }
            }
            Some(BusEvent::Disconnected) => {
                initial_connect = false;
                tracing::warn!("Broker connection lost");
            }
            None => break,
        }
    }
}

async fn close(publisher: &StatePublisher<MqttBus>, bus: &MqttBus) {
    if let Err(e) = publisher.publish_offline().await {
        tracing::debug!(error = %e, "Failed to publish offline status");
    }
    if let Err(e) = bus.disconnect().await {
        tracing::warn!(error = %e, "Failed to disconnect from broker");
    }
}
