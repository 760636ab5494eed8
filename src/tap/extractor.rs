// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for controller diagnostic lines.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::EventExtractor;

/// `EL: <id> <method> <value>`, value followed by whitespace or end of line.
const EVENT_LINE_PATTERN: &str = r"EL:\s+(\d+)\s+([\w.]+)\s+(-?\d+)(?:\s|$)";

fn event_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(EVENT_LINE_PATTERN).ok())
        .as_ref()
}

/// An `(id, method, value)` tuple recovered from a diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Controller object id.
    pub id: u32,
    /// Dotted method name, e.g. `Button.GetState`.
    pub method: String,
    /// Reported value.
    pub value: i64,
}

impl RawEvent {
    /// Creates a raw event.
    #[must_use]
    pub fn new(id: u32, method: impl Into<String>, value: i64) -> Self {
        Self {
            id,
            method: method.into(),
            value,
        }
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EL: {} {} {}", self.id, self.method, self.value)
    }
}

/// Extracts [`RawEvent`]s from free-form diagnostic text.
///
/// The extractor is stateless; the compiled pattern is shared by every
/// instance. It does not filter by method.
///
/// # Examples
///
/// ```
/// use vantage_bridge::tap::{DiagnosticLineExtractor, EventExtractor};
///
/// let extractor = DiagnosticLineExtractor::new();
/// let event = extractor.extract("<- EL: 42 Button.GetState 1").unwrap();
///
/// assert_eq!(event.id, 42);
/// assert_eq!(event.method, "Button.GetState");
/// assert_eq!(event.value, 1);
///
/// assert!(extractor.extract("R:INVOKE 42 Load.GetLevel").is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticLineExtractor;

impl DiagnosticLineExtractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventExtractor for DiagnosticLineExtractor {
    fn extract(&self, line: &str) -> Option<RawEvent> {
        let captures = event_pattern()?.captures(line)?;

        // Out-of-range numbers fail to parse and drop the line
        let id = captures.get(1)?.as_str().parse().ok()?;
        let method = captures.get(2)?.as_str();
        let value = captures.get(3)?.as_str().parse().ok()?;

        Some(RawEvent::new(id, method, value))
    }
}
