// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-load tracked state.

use tokio::time::Instant;

use crate::types::Level;

/// Last known state of a single load.
///
/// The level is only ever replaced by an update whose source timestamp is
/// not older than the one last applied, so a slow poll cannot undo a newer
/// command echo.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    level: Option<Level>,
    last_non_zero: Option<Level>,
    is_dimmable: bool,
    object_id: String,
    last_applied: Option<Instant>,
}

impl LoadState {
    /// Creates state for a load, seeded with the level known at discovery.
    #[must_use]
    pub fn new(object_id: impl Into<String>, is_dimmable: bool, level: Option<Level>) -> Self {
        Self {
            level,
            last_non_zero: level.filter(Level::is_on),
            is_dimmable,
            object_id: object_id.into(),
            last_applied: None,
        }
    }

    /// Returns the current level, if it has ever been observed.
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    /// Returns the most recent level above zero.
    #[must_use]
    pub fn last_non_zero(&self) -> Option<Level> {
        self.last_non_zero
    }

    /// Returns whether the load accepts intermediate levels.
    #[must_use]
    pub fn is_dimmable(&self) -> bool {
        self.is_dimmable
    }

    /// Returns the bus object id assigned to this load.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Applies a level observed at `at`.
    ///
    /// Returns `false` without changing anything if a strictly newer update
    /// has already been applied. Equal timestamps re-apply.
    pub fn apply(&mut self, level: Level, at: Instant) -> bool {
        if let Some(last) = self.last_applied
            && at < last
        {
            return false;
        }

        self.level = Some(level);
        if level.is_on() {
            self.last_non_zero = Some(level);
        }
        self.last_applied = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn level(value: f32) -> Level {
        Level::new(value).unwrap()
    }

    #[test]
    fn new_seeds_last_non_zero_from_discovery() {
        let on = LoadState::new("kitchen", true, Some(level(40.0)));
        assert_eq!(on.last_non_zero(), Some(level(40.0)));

        let off = LoadState::new("kitchen", true, Some(Level::MIN));
        assert_eq!(off.last_non_zero(), None);
        assert_eq!(off.level(), Some(Level::MIN));
    }

    #[test]
    fn zero_never_overwrites_last_non_zero() {
        let now = Instant::now();
        let mut state = LoadState::new("hall", true, None);

        assert!(state.apply(level(75.0), now));
        assert!(state.apply(Level::MIN, now + Duration::from_secs(1)));

        assert_eq!(state.level(), Some(Level::MIN));
        assert_eq!(state.last_non_zero(), Some(level(75.0)));
    }

    #[test]
    fn older_update_is_rejected() {
        let now = Instant::now();
        let mut state = LoadState::new("hall", true, None);

        assert!(state.apply(level(20.0), now + Duration::from_secs(2)));
        assert!(!state.apply(level(90.0), now));
        assert_eq!(state.level(), Some(level(20.0)));
    }

    #[test]
    fn equal_timestamp_reapplies() {
        let now = Instant::now();
        let mut state = LoadState::new("hall", false, None);

        assert!(state.apply(level(20.0), now));
        assert!(state.apply(level(30.0), now));
        assert_eq!(state.level(), Some(level(30.0)));
    }
}
