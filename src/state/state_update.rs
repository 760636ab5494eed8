// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outward state notifications.

use crate::types::Level;

/// A load level that was accepted into the cache.
///
/// Each applied update yields exactly one `StateUpdate`. Publishers turn it
/// into an on/off message and, for dimmable loads, a brightness message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateUpdate {
    /// The load that changed.
    pub load_id: u32,
    /// Its new level.
    pub level: Level,
    /// Whether a brightness value should accompany the on/off state.
    pub is_dimmable: bool,
}

impl StateUpdate {
    /// Returns `"ON"` or `"OFF"`.
    #[must_use]
    pub fn power_payload(&self) -> &'static str {
        if self.level.is_on() { "ON" } else { "OFF" }
    }

    /// Returns the 0-255 brightness for dimmable loads.
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        self.is_dimmable.then(|| self.level.to_brightness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimmable_update_carries_brightness() {
        let update = StateUpdate {
            load_id: 1,
            level: Level::MAX,
            is_dimmable: true,
        };
        assert_eq!(update.power_payload(), "ON");
        assert_eq!(update.brightness(), Some(255));
    }

    #[test]
    fn relay_update_has_no_brightness() {
        let update = StateUpdate {
            load_id: 1,
            level: Level::MIN,
            is_dimmable: false,
        };
        assert_eq!(update.power_payload(), "OFF");
        assert_eq!(update.brightness(), None);
    }
}
