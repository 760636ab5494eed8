// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of raw diagnostic events into keypad actions.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use super::RawEvent;
use crate::registry::Registry;

/// Method reported when a keypad button changes state.
pub const BUTTON_STATE_METHOD: &str = "Button.GetState";

/// Method reported when a virtual task starts or stops.
pub const TASK_RUNNING_METHOD: &str = "Task.IsRunning";

/// Display name used for tasks without a configured name.
const UNNAMED_TASK: &str = "Virtual Task";

// ============================================================================
// Event types
// ============================================================================

/// What kind of controller object produced a tap event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A physical keypad button.
    Button,
    /// A virtual task.
    Task,
}

impl TargetKind {
    /// Returns the lowercase name used in topics and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapAction {
    /// Reported value 1.
    Press,
    /// Reported value 0.
    Release,
}

impl TapAction {
    /// Maps a reported value to an action.
    #[must_use]
    pub const fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Press),
            0 => Some(Self::Release),
            _ => None,
        }
    }

    /// Returns the payload published for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for TapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The device a tap is attributed to.
///
/// Buttons on a keypad are grouped under the keypad's station id. Tasks and
/// buttons without a station each become their own virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    /// A physical keypad station.
    Station(u32),
    /// A stationless object, keyed by its own id.
    Virtual(u32),
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Station(id) => write!(f, "{id}"),
            Self::Virtual(vid) => write!(f, "task_{vid}"),
        }
    }
}

/// Identity of an announced keypad control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveredKey {
    /// The device the control belongs to.
    pub target: TargetId,
    /// Control position on that device.
    pub position: u32,
    /// The action being announced.
    pub action: TapAction,
}

/// A classified keypad or task event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapEvent {
    /// Source object kind.
    pub kind: TargetKind,
    /// Source object id.
    pub vid: u32,
    /// Owning station, 0 when there is none.
    pub station_id: u32,
    /// Button position, or the object id when no position is known.
    pub position: u32,
    /// Press or release.
    pub action: TapAction,
    /// The raw reported value.
    pub value: i64,
    /// Name of the device the control is shown under.
    pub display_name: String,
    /// Resolved area name, if any.
    pub area_name: Option<String>,
}

impl TapEvent {
    /// Returns the device this event is attributed to.
    #[must_use]
    pub const fn target(&self) -> TargetId {
        if self.station_id == 0 {
            TargetId::Virtual(self.vid)
        } else {
            TargetId::Station(self.station_id)
        }
    }

    /// Returns the key used to announce this control once.
    #[must_use]
    pub const fn discovered_key(&self) -> DiscoveredKey {
        DiscoveredKey {
            target: self.target(),
            position: self.position,
            action: self.action,
        }
    }
}

/// Why a raw event did not produce a [`TapEvent`].
///
/// None of these are failures; the event is dropped and logged at debug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Discard {
    /// The method is not a button or task state report.
    #[error("method {0} is not a keypad event")]
    IgnoredMethod(String),

    /// The id matches neither a button nor a task.
    #[error("no button or task with id {0}")]
    UnknownEntity(u32),

    /// The value is neither 1 (press) nor 0 (release).
    #[error("value {0} is not a press or release")]
    UnclassifiableAction(i64),

    /// The owning station is not in the allow-list.
    #[error("station {0} is not monitored")]
    StationFiltered(u32),
}

// ============================================================================
// Classifier
// ============================================================================

/// Attribution of a resolved button or task.
struct Source {
    kind: TargetKind,
    station_id: u32,
    position: u32,
    display_name: String,
    area_name: Option<String>,
}

/// Maps raw diagnostic events to keypad actions.
///
/// # Examples
///
/// ```
/// use vantage_bridge::registry::{Button, Registry, Station};
/// use vantage_bridge::tap::{ActionClassifier, RawEvent, TapAction, TargetId};
///
/// let registry = Registry::builder()
///     .station(Station::new(7, "Front Door"))
///     .button(Button::new(42, "Welcome").on_station(7, 1))
///     .build();
///
/// let classifier = ActionClassifier::new();
/// let event = classifier
///     .classify(&RawEvent::new(42, "Button.GetState", 1), &registry)
///     .unwrap();
///
/// assert_eq!(event.action, TapAction::Press);
/// assert_eq!(event.target(), TargetId::Station(7));
/// assert_eq!(event.display_name, "Front Door");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ActionClassifier {
    include_stations: Option<HashSet<u32>>,
}

impl ActionClassifier {
    /// Creates a classifier that accepts buttons on every station.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts button events to the given stations.
    ///
    /// An empty list disables filtering. Task events are never filtered.
    #[must_use]
    pub fn with_station_filter(mut self, stations: impl IntoIterator<Item = u32>) -> Self {
        let stations: HashSet<u32> = stations.into_iter().collect();
        self.include_stations = (!stations.is_empty()).then_some(stations);
        self
    }

    /// Classifies a raw event against the current registry snapshot.
    ///
    /// # Errors
    ///
    /// Returns the [`Discard`] reason when the event should be dropped.
    pub fn classify(&self, raw: &RawEvent, registry: &Registry) -> Result<TapEvent, Discard> {
        if raw.method != BUTTON_STATE_METHOD && raw.method != TASK_RUNNING_METHOD {
            return Err(Discard::IgnoredMethod(raw.method.clone()));
        }

        let source = Self::resolve(raw, registry)?;

        let action =
            TapAction::from_value(raw.value).ok_or(Discard::UnclassifiableAction(raw.value))?;

        if source.kind == TargetKind::Button
            && let Some(allowed) = &self.include_stations
            && !allowed.contains(&source.station_id)
        {
            return Err(Discard::StationFiltered(source.station_id));
        }

        Ok(TapEvent {
            kind: source.kind,
            vid: raw.id,
            station_id: source.station_id,
            position: source.position,
            action,
            value: raw.value,
            display_name: source.display_name,
            area_name: source.area_name,
        })
    }

    /// Classifies a raw event, logging and dropping discards.
    #[must_use]
    pub fn classify_opt(&self, raw: &RawEvent, registry: &Registry) -> Option<TapEvent> {
        match self.classify(raw, registry) {
            Ok(event) => Some(event),
            Err(reason) => {
                tracing::debug!(event = %raw, %reason, "Dropped diagnostic event");
                None
            }
        }
    }

    /// Resolves the id as a button first, then as a task.
    fn resolve(raw: &RawEvent, registry: &Registry) -> Result<Source, Discard> {
        if let Some(button) = registry.button(raw.id) {
            let station = button.station_id.and_then(|id| registry.station(id));
            let station_id = button.station_id.unwrap_or(0);

            let display_name = station.map_or_else(
                || format!("Keypad {station_id}"),
                |s| s.name.clone(),
            );
            let area_id = station.and_then(|s| s.area_id).or(button.area_id);

            return Ok(Source {
                kind: TargetKind::Button,
                station_id,
                position: button.position.unwrap_or(raw.id),
                display_name,
                area_name: registry.area_name(area_id).map(str::to_owned),
            });
        }

        if let Some(task) = registry.task(raw.id) {
            let display_name = if task.name.is_empty() {
                UNNAMED_TASK.to_string()
            } else {
                task.name.clone()
            };

            return Ok(Source {
                kind: TargetKind::Task,
                station_id: 0,
                position: raw.id,
                display_name,
                area_name: registry.area_name(task.area_id).map(str::to_owned),
            });
        }

        Err(Discard::UnknownEntity(raw.id))
    }
}
