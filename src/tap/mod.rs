// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keypad event capture from the controller's diagnostic stream.
//!
//! The controller has no reliable event feed for button presses. They are
//! recovered from diagnostic text instead, in three stages:
//!
//! 1. A [`LineSink`] accepts raw lines from wherever they are observed,
//!    typically a [`DiagnosticTapLayer`] installed in the application's
//!    `tracing` subscriber.
//! 2. An [`EventExtractor`] turns a line into a [`RawEvent`].
//! 3. The [`ActionClassifier`] resolves the event against the current
//!    [`Registry`](crate::registry::Registry) into a [`TapEvent`].
//!
//! # Examples
//!
//! ```
//! use vantage_bridge::registry::{Button, Registry, Station};
//! use vantage_bridge::tap::{ActionClassifier, DiagnosticLineExtractor, EventExtractor};
//!
//! let registry = Registry::builder()
//!     .station(Station::new(7, "Hall"))
//!     .button(Button::new(42, "Lights").on_station(7, 2))
//!     .build();
//!
//! let raw = DiagnosticLineExtractor::new()
//!     .extract("EL: 42 Button.GetState 1")
//!     .unwrap();
//! let event = ActionClassifier::new().classify(&raw, &registry).unwrap();
//!
//! assert_eq!(event.position, 2);
//! ```

mod classifier;
mod extractor;
mod layer;

use tokio::sync::mpsc;

pub use classifier::{
    ActionClassifier, BUTTON_STATE_METHOD, Discard, DiscoveredKey, TASK_RUNNING_METHOD, TapAction,
    TapEvent, TargetId, TargetKind,
};
pub use extractor::{DiagnosticLineExtractor, RawEvent};
pub use layer::DiagnosticTapLayer;

/// Parses free-form diagnostic lines into raw events.
pub trait EventExtractor: Send + Sync {
    /// Returns the event carried by `line`, or `None` if the line does not
    /// contain one.
    fn extract(&self, line: &str) -> Option<RawEvent>;
}

/// Receiving end of a [`line_channel`].
pub type LineStream = mpsc::UnboundedReceiver<String>;

/// Thread-safe handle for handing diagnostic lines to the bridge.
///
/// Sending never blocks, so it is safe from synchronous contexts such as a
/// `tracing` layer or a foreign callback thread.
#[derive(Debug, Clone)]
pub struct LineSink {
    sender: mpsc::UnboundedSender<String>,
}

impl LineSink {
    /// Hands a line to the bridge.
    ///
    /// Returns `false` if the receiving side has shut down.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.sender.send(line.into()).is_ok()
    }

    /// Returns `true` if the receiving side has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Creates a connected [`LineSink`] and [`LineStream`].
#[must_use]
pub fn line_channel() -> (LineSink, LineStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (LineSink { sender }, receiver)
}
