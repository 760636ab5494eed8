// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A `tracing` layer that captures the controller client's diagnostic lines.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use super::LineSink;

/// Marker that identifies event lines in the controller's diagnostic log.
const EVENT_MARKER: &str = "EL:";

/// Forwards diagnostic event lines logged by a controller client to a
/// [`LineSink`].
///
/// Controller clients typically log every line they receive at debug level.
/// Installing this layer next to the application's formatting layer taps
/// those lines without any cooperation from the client. Only messages that
/// contain `EL:` and come from a target under the configured prefix are
/// forwarded.
///
/// # Examples
///
/// ```
/// use tracing_subscriber::layer::SubscriberExt;
/// use vantage_bridge::tap::{DiagnosticTapLayer, line_channel};
///
/// let (sink, mut lines) = line_channel();
/// let subscriber = tracing_subscriber::registry()
///     .with(DiagnosticTapLayer::new(sink).with_target_prefix("vantage_client"));
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::debug!(target: "vantage_client::conn", "<- EL: 42 Button.GetState 1");
///     tracing::debug!(target: "other", "EL: 1 Button.GetState 1");
/// });
///
/// assert_eq!(lines.try_recv().unwrap(), "<- EL: 42 Button.GetState 1");
/// assert!(lines.try_recv().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticTapLayer {
    sink: LineSink,
    target_prefix: String,
}

impl DiagnosticTapLayer {
    /// Creates a layer that taps every target.
    #[must_use]
    pub fn new(sink: LineSink) -> Self {
        Self {
            sink,
            target_prefix: String::new(),
        }
    }

    /// Restricts tapping to events whose target starts with `prefix`.
    #[must_use]
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = prefix.into();
        self
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticTapLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with(&self.target_prefix) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message
            && message.contains(EVENT_MARKER)
        {
            self.sink.send(message);
        }
    }
}

/// Captures the `message` field of an event.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}
