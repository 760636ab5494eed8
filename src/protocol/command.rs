// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound load commands.

use super::Topics;

/// What a command asks a load to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Turn on at the last non-zero level.
    TurnOn,
    /// Turn off.
    TurnOff,
    /// Set an MQTT brightness (0-255).
    SetBrightness(u8),
}

/// A command addressed to one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCommand {
    /// Target load.
    pub load_id: u32,
    /// Requested change.
    pub kind: CommandKind,
}

impl LoadCommand {
    /// Creates a command.
    #[must_use]
    pub const fn new(load_id: u32, kind: CommandKind) -> Self {
        Self { load_id, kind }
    }

    /// Parses a message received on a command topic.
    ///
    /// - `<base>/light/<id>/set` accepts `ON` and `OFF` (case-insensitive).
    /// - `<base>/light/<id>/brightness/set` accepts an integer, clamped to
    ///   0-255, or `ON`.
    ///
    /// Anything else yields `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vantage_bridge::protocol::{CommandKind, LoadCommand, Topics};
    ///
    /// let topics = Topics::default();
    ///
    /// let cmd = LoadCommand::parse(&topics, "vantage/light/12/set", b"on").unwrap();
    /// assert_eq!(cmd.kind, CommandKind::TurnOn);
    ///
    /// let cmd = LoadCommand::parse(&topics, "vantage/light/12/brightness/set", b"300").unwrap();
    /// assert_eq!(cmd.kind, CommandKind::SetBrightness(255));
    ///
    /// assert!(LoadCommand::parse(&topics, "vantage/light/12/set", b"toggle").is_none());
    /// ```
    #[must_use]
    pub fn parse(topics: &Topics, topic: &str, payload: &[u8]) -> Option<Self> {
        let (load_id, suffix) = topics.split_light_topic(topic)?;
        let payload = String::from_utf8_lossy(payload);
        let payload = payload.trim();

        let kind = match suffix {
            "set" => parse_switch(payload)?,
            "brightness/set" => parse_brightness(payload)?,
            _ => return None,
        };

        Some(Self { load_id, kind })
    }
}

fn parse_switch(payload: &str) -> Option<CommandKind> {
    if payload.eq_ignore_ascii_case("ON") {
        Some(CommandKind::TurnOn)
    } else if payload.eq_ignore_ascii_case("OFF") {
        Some(CommandKind::TurnOff)
    } else {
        None
    }
}

fn parse_brightness(payload: &str) -> Option<CommandKind> {
    if let Ok(value) = payload.parse::<i64>() {
        let clamped = u8::try_from(value.clamp(0, 255)).ok()?;
        return Some(CommandKind::SetBrightness(clamped));
    }
    payload
        .eq_ignore_ascii_case("ON")
        .then_some(CommandKind::TurnOn)
}
