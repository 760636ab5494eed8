// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only snapshot of the controller's configured objects.
//!
//! A [`Registry`] is built from one discovery scan and never mutated
//! afterwards. Rediscovery builds a new snapshot and swaps it in whole, so
//! readers holding an `Arc<Registry>` always see a consistent set.
//!
//! # Examples
//!
//! ```
//! use vantage_bridge::registry::{Area, Button, Registry, Station};
//!
//! let registry = Registry::builder()
//!     .area(Area::new(3, "Kitchen"))
//!     .station(Station::new(7, "Kitchen Door").in_area(3))
//!     .button(Button::new(42, "Scene 1").on_station(7, 1))
//!     .build();
//!
//! assert_eq!(registry.button(42).unwrap().station_id, Some(7));
//! assert_eq!(registry.area_name(Some(3)), Some("Kitchen"));
//! ```

mod entities;

use std::collections::BTreeMap;

pub use entities::{Area, Button, Load, Station, Task};

use crate::controller::Controller;
use crate::error::ControllerError;

/// Immutable snapshot of loads, keypads, tasks and areas keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    loads: BTreeMap<u32, Load>,
    stations: BTreeMap<u32, Station>,
    buttons: BTreeMap<u32, Button>,
    tasks: BTreeMap<u32, Task>,
    areas: BTreeMap<u32, Area>,
}

impl Registry {
    /// Creates an empty registry builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Runs a full discovery scan against the controller.
    ///
    /// # Errors
    ///
    /// Returns the first controller error encountered. A partial scan is
    /// never returned.
    pub async fn discover<C: Controller>(controller: &C) -> Result<Self, ControllerError> {
        let areas = controller.enumerate_areas().await?;
        let loads = controller.enumerate_loads().await?;
        let stations = controller.enumerate_stations().await?;
        let buttons = controller.enumerate_buttons().await?;
        let tasks = controller.enumerate_tasks().await?;

        let registry = Self::builder()
            .areas(areas)
            .loads(loads)
            .stations(stations)
            .buttons(buttons)
            .tasks(tasks)
            .build();

        tracing::info!(
            loads = registry.loads.len(),
            stations = registry.stations.len(),
            buttons = registry.buttons.len(),
            tasks = registry.tasks.len(),
            areas = registry.areas.len(),
            "Controller discovery complete"
        );

        Ok(registry)
    }

    /// Returns the load with the given id.
    #[must_use]
    pub fn load_by_id(&self, id: u32) -> Option<&Load> {
        self.loads.get(&id)
    }

    /// Iterates over all loads in ascending id order.
    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.loads.values()
    }

    /// Returns the number of loads.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.len()
    }

    /// Returns the station with the given id.
    #[must_use]
    pub fn station(&self, id: u32) -> Option<&Station> {
        self.stations.get(&id)
    }

    /// Returns the button with the given id.
    #[must_use]
    pub fn button(&self, vid: u32) -> Option<&Button> {
        self.buttons.get(&vid)
    }

    /// Returns the task with the given id.
    #[must_use]
    pub fn task(&self, vid: u32) -> Option<&Task> {
        self.tasks.get(&vid)
    }

    /// Returns the area with the given id.
    #[must_use]
    pub fn area(&self, id: u32) -> Option<&Area> {
        self.areas.get(&id)
    }

    /// Resolves an optional area id to its name.
    #[must_use]
    pub fn area_name(&self, id: Option<u32>) -> Option<&str> {
        id.and_then(|id| self.areas.get(&id)).map(|a| a.name.as_str())
    }
}

/// Builder for [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Adds a load.
    #[must_use]
    pub fn load(mut self, load: Load) -> Self {
        self.registry.loads.insert(load.id, load);
        self
    }

    /// Adds several loads.
    #[must_use]
    pub fn loads(self, loads: impl IntoIterator<Item = Load>) -> Self {
        loads.into_iter().fold(self, Self::load)
    }

    /// Adds a station.
    #[must_use]
    pub fn station(mut self, station: Station) -> Self {
        self.registry.stations.insert(station.id, station);
        self
    }

    /// Adds several stations.
    #[must_use]
    pub fn stations(self, stations: impl IntoIterator<Item = Station>) -> Self {
        stations.into_iter().fold(self, Self::station)
    }

    /// Adds a button.
    #[must_use]
    pub fn button(mut self, button: Button) -> Self {
        self.registry.buttons.insert(button.vid, button);
        self
    }

    /// Adds several buttons.
    #[must_use]
    pub fn buttons(self, buttons: impl IntoIterator<Item = Button>) -> Self {
        buttons.into_iter().fold(self, Self::button)
    }

    /// Adds a task.
    #[must_use]
    pub fn task(mut self, task: Task) -> Self {
        self.registry.tasks.insert(task.vid, task);
        self
    }

    /// Adds several tasks.
    #[must_use]
    pub fn tasks(self, tasks: impl IntoIterator<Item = Task>) -> Self {
        tasks.into_iter().fold(self, Self::task)
    }

    /// Adds an area.
    #[must_use]
    pub fn area(mut self, area: Area) -> Self {
        self.registry.areas.insert(area.id, area);
        self
    }

    /// Adds several areas.
    #[must_use]
    pub fn areas(self, areas: impl IntoIterator<Item = Area>) -> Self {
        areas.into_iter().fold(self, Self::area)
    }

    /// Finishes the snapshot.
    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}
