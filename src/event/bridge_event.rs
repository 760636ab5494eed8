// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge output events.

use crate::state::{LoadDescriptor, StateUpdate};
use crate::tap::TapEvent;

/// Everything the bridge reports to the outside world.
///
/// The MQTT publisher turns each event into one or more bus messages; other
/// subscribers can observe the same stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A load level was accepted into the state cache.
    StateUpdated(StateUpdate),

    /// A keypad button or task was pressed or released.
    Tap(TapEvent),

    /// A keypad control was seen for the first time since the last
    /// (re)discovery or bus reconnect and should be announced.
    ControlDiscovered(TapEvent),

    /// The set of loads was (re)discovered and should be announced.
    LoadsDiscovered(Vec<LoadDescriptor>),
}

impl BridgeEvent {
    /// Returns the load this event concerns, for state updates.
    #[must_use]
    pub fn load_id(&self) -> Option<u32> {
        match self {
            Self::StateUpdated(update) => Some(update.load_id),
            _ => None,
        }
    }
}
