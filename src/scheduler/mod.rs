// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hybrid push/poll state reconciliation.
//!
//! The controller's push channel is best effort: scene changes triggered from
//! keypads often produce no state notification at all. The
//! [`ReconciliationScheduler`] compensates with targeted polling. A keypad
//! press moves the loop from [`Phase::Idle`] to [`Phase::Settling`]; after the
//! settle delay it runs a single full fetch ([`Phase::Polling`]) unless live
//! state arrived in the meantime. Without presses it still polls once per
//! interval.
//!
//! ```text
//!           trigger()                settle delay
//!   Idle ─────────────▶ Settling ─────────────────▶ quiet? ──yes──▶ Idle
//!    ▲  └─────── interval ───────────────────────────▲  │no
//!    │                                                  ▼
//!    └──────────────────────────────────────────── Polling
//! ```

mod config;
mod handle;
mod reconcile;

pub use config::{
    DEFAULT_POLL_INTERVAL, DEFAULT_QUIET_TIME, DEFAULT_SETTLE_DELAY, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_STARTUP_DELAY, SchedulerConfig,
};
pub use handle::{Phase, ReconciliationState, SchedulerHandle};
pub use reconcile::ReconciliationScheduler;
