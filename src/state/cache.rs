// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-load state cache.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{LoadState, StateUpdate};
use crate::event::{BridgeEvent, EventBus};
use crate::registry::Registry;
use crate::types::Level;

/// Area name used for loads without an area.
pub const UNASSIGNED_AREA: &str = "Unassigned";

/// Descriptive data for announcing a load on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDescriptor {
    /// Controller load id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Unique bus object id.
    pub object_id: String,
    /// Area name, `Unassigned` when the load has none.
    pub area_name: String,
    /// Whether the load accepts intermediate levels.
    pub is_dimmable: bool,
}

/// Last known state of every discovered load.
///
/// The cache is the only writer of load levels. Every accepted update is
/// published as [`BridgeEvent::StateUpdated`] while the cache lock is still
/// held, so subscribers see updates for a load in the order they were
/// applied.
///
/// # Examples
///
/// ```
/// use tokio::time::Instant;
/// use vantage_bridge::event::EventBus;
/// use vantage_bridge::registry::{Load, Registry};
/// use vantage_bridge::state::DeviceStateCache;
/// use vantage_bridge::types::Level;
///
/// let registry = Registry::builder().load(Load::new(5, "Porch")).build();
/// let cache = DeviceStateCache::new(EventBus::new());
/// cache.replace_from_registry(&registry);
///
/// let now = Instant::now();
/// cache.record_level(5, Level::new(75.0).unwrap(), now);
/// cache.record_level(5, Level::MIN, now);
///
/// assert_eq!(cache.restore_level(5), Level::new(75.0).unwrap());
/// assert_eq!(cache.object_id(5).as_deref(), Some("porch"));
/// ```
#[derive(Debug)]
pub struct DeviceStateCache {
    loads: Mutex<BTreeMap<u32, LoadState>>,
    events: EventBus,
}

impl DeviceStateCache {
    /// Creates an empty cache that publishes accepted updates on `events`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            loads: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Replaces the tracked loads with those in `registry`.
    ///
    /// Levels and restore levels are reseeded from the discovery scan.
    /// Returns the descriptors of the new load set in id order.
    pub fn replace_from_registry(&self, registry: &Registry) -> Vec<LoadDescriptor> {
        let object_ids = assign_object_ids(registry);

        let mut descriptors = Vec::with_capacity(registry.load_count());
        let mut loads = BTreeMap::new();

        for load in registry.loads() {
            let object_id = object_ids
                .get(&load.id)
                .cloned()
                .unwrap_or_else(|| format!("load_{}", load.id));

            loads.insert(
                load.id,
                LoadState::new(object_id.clone(), load.is_dimmable, load.level),
            );
            descriptors.push(LoadDescriptor {
                id: load.id,
                name: load.name.clone(),
                object_id,
                area_name: registry
                    .area_name(load.area_id)
                    .unwrap_or(UNASSIGNED_AREA)
                    .to_string(),
                is_dimmable: load.is_dimmable,
            });
        }

        *self.loads.lock() = loads;
        descriptors
    }

    /// Records a level observed at `at`.
    ///
    /// Unknown loads and updates older than the last applied one for the
    /// load are ignored. An accepted update is published and returned.
    pub fn record_level(&self, load_id: u32, level: Level, at: Instant) -> Option<StateUpdate> {
        let mut loads = self.loads.lock();

        let Some(state) = loads.get_mut(&load_id) else {
            tracing::debug!(load_id, "Ignoring level for unknown load");
            return None;
        };

        if !state.apply(level, at) {
            tracing::debug!(load_id, %level, "Ignoring stale level");
            return None;
        }

        let update = StateUpdate {
            load_id,
            level,
            is_dimmable: state.is_dimmable(),
        };
        self.events.publish(BridgeEvent::StateUpdated(update));
        Some(update)
    }

    /// Publishes the current state of every load, unobserved levels as off.
    pub fn publish_all(&self) {
        let loads = self.loads.lock();
        for (&load_id, state) in loads.iter() {
            self.events.publish(BridgeEvent::StateUpdated(StateUpdate {
                load_id,
                level: state.level().unwrap_or_default(),
                is_dimmable: state.is_dimmable(),
            }));
        }
    }

    /// Returns the level a bare "on" command should restore.
    ///
    /// This is the most recent level above zero, or full brightness if the
    /// load has never been seen on.
    #[must_use]
    pub fn restore_level(&self, load_id: u32) -> Level {
        self.loads
            .lock()
            .get(&load_id)
            .and_then(LoadState::last_non_zero)
            .unwrap_or(Level::MAX)
    }

    /// Returns every load's current level in id order, unobserved as off.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<(u32, Level)> {
        self.loads
            .lock()
            .iter()
            .map(|(&id, state)| (id, state.level().unwrap_or_default()))
            .collect()
    }

    /// Returns the state of one load.
    #[must_use]
    pub fn get(&self, load_id: u32) -> Option<LoadState> {
        self.loads.lock().get(&load_id).cloned()
    }

    /// Returns `true` if the load is tracked.
    #[must_use]
    pub fn contains(&self, load_id: u32) -> bool {
        self.loads.lock().contains_key(&load_id)
    }

    /// Returns the bus object id of a load.
    #[must_use]
    pub fn object_id(&self, load_id: u32) -> Option<String> {
        self.loads
            .lock()
            .get(&load_id)
            .map(|s| s.object_id().to_string())
    }

    /// Returns whether a load is dimmable.
    #[must_use]
    pub fn is_dimmable(&self, load_id: u32) -> Option<bool> {
        self.loads.lock().get(&load_id).map(LoadState::is_dimmable)
    }

    /// Returns the number of tracked loads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loads.lock().len()
    }

    /// Returns `true` if no loads are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loads.lock().is_empty()
    }
}

/// Lowercases and collapses every run of non-alphanumerics into `_`.
fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut pending_separator = false;

    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("load");
    }
    slug
}

/// Assigns unique object ids.
///
/// Loads sharing a slug are numbered `_2`, `_3`... in ascending id order.
/// Fan loads get a `_load` suffix so they are not mistaken for fan entities.
fn assign_object_ids(registry: &Registry) -> HashMap<u32, String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut ids = HashMap::with_capacity(registry.load_count());

    for load in registry.loads() {
        let base = slugify(&load.name);
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;

        let mut object_id = if *count == 1 {
            base
        } else {
            format!("{base}_{count}")
        };
        if load.name.to_lowercase().contains("fan") {
            object_id.push_str("_load");
        }
        ids.insert(load.id, object_id);
    }

    ids
}
