// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller entities as reported by a discovery scan.

use crate::types::Level;

/// A controllable lighting or relay output.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// Stable controller id.
    pub id: u32,
    /// Display name configured on the controller.
    pub name: String,
    /// Whether the load accepts intermediate levels.
    pub is_dimmable: bool,
    /// Level reported at discovery time, if known.
    pub level: Option<Level>,
    /// Owning area, if any.
    pub area_id: Option<u32>,
}

impl Load {
    /// Creates a dimmable load with no known level and no area.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_dimmable: true,
            level: None,
            area_id: None,
        }
    }

    /// Marks the load as on/off only.
    #[must_use]
    pub fn relay(mut self) -> Self {
        self.is_dimmable = false;
        self
    }

    /// Sets the level known at discovery time.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the owning area.
    #[must_use]
    pub fn in_area(mut self, area_id: u32) -> Self {
        self.area_id = Some(area_id);
        self
    }
}

/// A physical keypad housing one or more buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    /// Stable controller id.
    pub id: u32,
    /// Display name configured on the controller.
    pub name: String,
    /// Area the keypad is installed in.
    pub area_id: Option<u32>,
}

impl Station {
    /// Creates a station with no area.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area_id: None,
        }
    }

    /// Sets the area.
    #[must_use]
    pub fn in_area(mut self, area_id: u32) -> Self {
        self.area_id = Some(area_id);
        self
    }
}

/// A keypad button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Stable controller id.
    pub vid: u32,
    /// Button index on its keypad, when the controller reports one.
    pub position: Option<u32>,
    /// Owning keypad.
    pub station_id: Option<u32>,
    /// The button's own area, used when its keypad has none.
    pub area_id: Option<u32>,
    /// Engraving or configured label.
    pub name: String,
}

impl Button {
    /// Creates a button with no station, position or area.
    #[must_use]
    pub fn new(vid: u32, name: impl Into<String>) -> Self {
        Self {
            vid,
            position: None,
            station_id: None,
            area_id: None,
            name: name.into(),
        }
    }

    /// Places the button on a keypad at the given position.
    #[must_use]
    pub fn on_station(mut self, station_id: u32, position: u32) -> Self {
        self.station_id = Some(station_id);
        self.position = Some(position);
        self
    }

    /// Sets the button's own area.
    #[must_use]
    pub fn in_area(mut self, area_id: u32) -> Self {
        self.area_id = Some(area_id);
        self
    }
}

/// A virtual task (program) that can be started from keypads or schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable controller id.
    pub vid: u32,
    /// Display name configured on the controller.
    pub name: String,
    /// Area the task belongs to.
    pub area_id: Option<u32>,
}

impl Task {
    /// Creates a task with no area.
    #[must_use]
    pub fn new(vid: u32, name: impl Into<String>) -> Self {
        Self {
            vid,
            name: name.into(),
            area_id: None,
        }
    }

    /// Sets the area.
    #[must_use]
    pub fn in_area(mut self, area_id: u32) -> Self {
        self.area_id = Some(area_id);
        self
    }
}

/// A named area (room, floor, zone).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    /// Stable controller id.
    pub id: u32,
    /// Display name.
    pub name: String,
}

impl Area {
    /// Creates an area.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
