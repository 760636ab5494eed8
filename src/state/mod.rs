// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load state tracking.
//!
//! [`DeviceStateCache`] keeps the last known level of every discovered load
//! and the last level above zero, which a bare "on" command restores.
//! Updates carry the time they were observed at the source; an update older
//! than the one already applied is dropped, so push notifications, command
//! echoes and polls can race without an older reading winning.
//!
//! Accepted updates are published as [`StateUpdate`]s on the bridge's
//! [`EventBus`](crate::event::EventBus).

mod cache;
mod load_state;
mod state_update;

pub use cache::{DeviceStateCache, LoadDescriptor, UNASSIGNED_AREA};
pub use load_state::LoadState;
pub use state_update::StateUpdate;
