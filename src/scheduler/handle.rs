// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared reconciliation state and the handle used to drive it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Where the reconciliation loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for a trigger or the next interval.
    Idle,
    /// A press was seen; waiting for the scene to settle.
    Settling,
    /// A full state fetch is in flight.
    Polling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Settling => "settling",
            Self::Polling => "polling",
        };
        f.write_str(name)
    }
}

/// Snapshot of the reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Last time confirmed state arrived from the controller.
    pub last_live_activity: Instant,
    /// Current phase.
    pub phase: Phase,
    /// Wall-clock time of the last successful poll.
    pub last_poll: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ReconciliationState>,
    wake: Notify,
}

/// Cloneable handle to the reconciliation loop.
///
/// Presses call [`trigger`](Self::trigger); confirmed controller state calls
/// [`mark_live`](Self::mark_live). Both are cheap and never block.
///
/// # Examples
///
/// ```
/// use vantage_bridge::scheduler::{Phase, SchedulerHandle};
///
/// let handle = SchedulerHandle::new();
///
/// assert!(handle.trigger());
/// assert_eq!(handle.phase(), Phase::Settling);
///
/// // Further presses are folded into the pending poll
/// assert!(!handle.trigger());
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Creates a handle in the idle phase with live activity set to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ReconciliationState {
                    last_live_activity: Instant::now(),
                    phase: Phase::Idle,
                    last_poll: None,
                }),
                wake: Notify::new(),
            }),
        }
    }

    /// Requests a poll after the settle delay.
    ///
    /// Returns `true` if this call started a new cycle. While a cycle is
    /// settling or polling the request is coalesced and `false` is returned.
    pub fn trigger(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Idle {
            return false;
        }
        state.phase = Phase::Settling;
        self.shared.wake.notify_one();
        true
    }

    /// Records that confirmed state just arrived from the controller.
    pub fn mark_live(&self) {
        self.shared.state.lock().last_live_activity = Instant::now();
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Returns the last time confirmed state arrived.
    #[must_use]
    pub fn last_live_activity(&self) -> Instant {
        self.shared.state.lock().last_live_activity
    }

    /// Returns the wall-clock time of the last successful poll.
    #[must_use]
    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().last_poll
    }

    /// Returns a copy of the full state.
    #[must_use]
    pub fn snapshot(&self) -> ReconciliationState {
        *self.shared.state.lock()
    }

    pub(super) fn set_phase(&self, phase: Phase) {
        self.shared.state.lock().phase = phase;
    }

    pub(super) fn record_poll_success(&self) {
        let mut state = self.shared.state.lock();
        state.last_live_activity = Instant::now();
        state.last_poll = Some(Utc::now());
    }

    pub(super) async fn woken(&self) {
        self.shared.wake.notified().await;
    }
}

impl Default for SchedulerHandle {
    fn default() -> Self {
        Self::new()
    }
}
