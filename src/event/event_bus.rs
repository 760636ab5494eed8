// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting bridge events.

use tokio::sync::broadcast;

use super::BridgeEvent;

/// Default channel capacity.
///
/// Rediscovery emits one event per load back to back, so the buffer must
/// hold a full installation's worth of updates.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting bridge events to multiple subscribers.
///
/// The `EventBus` uses tokio's broadcast channel so the bus publisher, tests
/// and any application-level observers each receive every event.
///
/// A subscriber that falls more than the channel capacity behind loses the
/// oldest events and observes `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use vantage_bridge::event::{BridgeEvent, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(BridgeEvent::LoadsDiscovered(Vec::new()));
///
/// assert!(matches!(rx.try_recv(), Ok(BridgeEvent::LoadsDiscovered(_))));
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// Events published while nobody is subscribed are dropped.
    pub fn publish(&self, event: BridgeEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    /// Publishes an event and returns the number of receivers that received it.
    ///
    /// Returns 0 if there are no subscribers.
    #[must_use]
    pub fn publish_counted(&self, event: BridgeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
