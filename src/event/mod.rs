// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for bridge output.
//!
//! The coordinator and the state cache publish [`BridgeEvent`]s on an
//! [`EventBus`]. Publishing never blocks and never fails, which keeps the
//! control path independent from the bus connection.
//!
//! # Examples
//!
//! ```
//! use vantage_bridge::event::{BridgeEvent, EventBus};
//! use vantage_bridge::state::StateUpdate;
//! use vantage_bridge::types::Level;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(BridgeEvent::StateUpdated(StateUpdate {
//!     load_id: 12,
//!     level: Level::MAX,
//!     is_dimmable: true,
//! }));
//!
//! assert_eq!(rx.try_recv().unwrap().load_id(), Some(12));
//! ```

mod bridge_event;
mod event_bus;

pub use bridge_event::BridgeEvent;
pub use event_bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
