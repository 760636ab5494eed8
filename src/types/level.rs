// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load level type for brightness control.
//!
//! The controller reports and accepts load levels as a percentage between
//! 0.0 and 100.0, while MQTT lights speak a 0-255 brightness scale. [`Level`]
//! keeps the controller-native value and converts at the edge.

use std::fmt;

use crate::error::ValueError;

/// Maximum brightness on the MQTT side.
const BRIGHTNESS_SCALE: f32 = 255.0;

/// Load level as a percentage (0.0-100.0).
///
/// # Examples
///
/// ```
/// use vantage_bridge::types::Level;
///
/// let level = Level::new(75.0).unwrap();
/// assert_eq!(level.value(), 75.0);
/// assert!(level.is_on());
///
/// assert_eq!(Level::from_brightness(255), Level::MAX);
/// assert_eq!(Level::MAX.to_brightness(), 255);
///
/// assert!(Level::new(100.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Level(f32);

impl Level {
    /// Fully off.
    pub const MIN: Self = Self(0.0);

    /// Full brightness.
    pub const MAX: Self = Self(100.0);

    /// Creates a new level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::LevelOutOfRange` if the value is not a number
    /// or lies outside 0.0-100.0.
    pub fn new(value: f32) -> Result<Self, ValueError> {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValueError::LevelOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Creates a level, clamping to the valid range.
    ///
    /// `NaN` is treated as off.
    ///
    /// # Examples
    ///
    /// ```
    /// use vantage_bridge::types::Level;
    ///
    /// assert_eq!(Level::clamped(140.0), Level::MAX);
    /// assert_eq!(Level::clamped(-3.0), Level::MIN);
    /// ```
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self(value.clamp(0.0, 100.0))
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> f32 {
        self.0
    }

    /// Returns `true` if the load is on at any level.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.0 > 0.0
    }

    /// Converts an MQTT brightness (0-255) to a level.
    #[must_use]
    pub fn from_brightness(brightness: u8) -> Self {
        Self::clamped(f32::from(brightness) / BRIGHTNESS_SCALE * 100.0)
    }

    /// Converts the level to an MQTT brightness (0-255), rounding to nearest.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_brightness(&self) -> u8 {
        // Safe: self.0 is within 0-100, so the result is within 0-255
        (self.0 / 100.0 * BRIGHTNESS_SCALE).round() as u8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl TryFrom<f32> for Level {
    type Error = ValueError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
