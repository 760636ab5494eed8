// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The lighting controller boundary.
//!
//! The bridge never talks to the controller's wire protocol itself. Callers
//! supply a [`Controller`] implementation that enumerates the configured
//! objects, reports load levels and executes level changes. Every call is
//! expected to go through the [`CommandThrottler`](crate::throttle::CommandThrottler)
//! or the reconciliation poll; the bridge never issues calls in parallel.

use std::future::Future;

use tokio::sync::broadcast;

use crate::error::ControllerError;
use crate::registry::{Area, Button, Load, Station, Task};
use crate::types::Level;

/// A load level as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReport {
    /// The load the report is about.
    pub load_id: u32,
    /// The reported level.
    pub level: Level,
}

impl LevelReport {
    /// Creates a new report.
    #[must_use]
    pub const fn new(load_id: u32, level: Level) -> Self {
        Self { load_id, level }
    }
}

/// Access to a lighting controller.
///
/// Implementations must be shareable across tasks. All returned futures are
/// `Send` so the bridge can drive them from spawned tasks.
pub trait Controller: Send + Sync + 'static {
    /// Lists all configured areas.
    fn enumerate_areas(&self) -> impl Future<Output = Result<Vec<Area>, ControllerError>> + Send;

    /// Lists all configured loads with their current levels where known.
    fn enumerate_loads(&self) -> impl Future<Output = Result<Vec<Load>, ControllerError>> + Send;

    /// Lists all keypad stations.
    fn enumerate_stations(
        &self,
    ) -> impl Future<Output = Result<Vec<Station>, ControllerError>> + Send;

    /// Lists all keypad buttons.
    fn enumerate_buttons(
        &self,
    ) -> impl Future<Output = Result<Vec<Button>, ControllerError>> + Send;

    /// Lists all virtual tasks.
    fn enumerate_tasks(&self) -> impl Future<Output = Result<Vec<Task>, ControllerError>> + Send;

    /// Reads the current level of every load.
    fn fetch_full_state(
        &self,
    ) -> impl Future<Output = Result<Vec<LevelReport>, ControllerError>> + Send;

    /// Sets a load to the given level.
    fn set_level(
        &self,
        load_id: u32,
        level: Level,
    ) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Turns a load off.
    fn turn_off(&self, load_id: u32) -> impl Future<Output = Result<(), ControllerError>> + Send;

    /// Subscribes to best-effort state-change notifications.
    ///
    /// Controllers without a push channel return `None`; the bridge then
    /// relies on polling alone.
    fn state_changes(&self) -> Option<broadcast::Receiver<LevelReport>> {
        None
    }
}
