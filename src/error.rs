// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Vantage bridge.
//!
//! The hierarchy separates failures by where they come from: controller
//! calls, MQTT communication, value validation and configuration. Dropped
//! diagnostic lines are not errors; see [`Discard`](crate::tap::Discard).

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A call into the lighting controller failed.
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    /// MQTT communication failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A value was outside its allowed range.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The bridge configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The load is not part of the current discovery snapshot.
    #[error("unknown load {0}")]
    UnknownLoad(u32),
}

/// Errors reported by a [`Controller`](crate::controller::Controller)
/// implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller rejected or failed to execute a call.
    #[error("{operation} failed: {message}")]
    CallFailed {
        /// The controller operation that failed.
        operation: &'static str,
        /// Description reported by the controller client.
        message: String,
    },

    /// The controller connection is not available.
    #[error("controller is not connected")]
    NotConnected,

    /// The call did not complete in time.
    #[error("controller call timed out after {0} ms")]
    Timeout(u64),
}

impl ControllerError {
    /// Creates a [`ControllerError::CallFailed`] for the given operation.
    #[must_use]
    pub fn call_failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::CallFailed {
            operation,
            message: message.into(),
        }
    }
}

/// Errors related to MQTT communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The MQTT client rejected a request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The broker connection is currently down.
    #[error("not connected to broker")]
    NotConnected,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// A payload could not be serialized.
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors related to value validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A load level is outside 0-100 or not a number.
    #[error("level {0} is out of range [0, 100]")]
    LevelOutOfRange(f32),
}

/// Errors raised while building the bridge configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A mandatory setting is not present.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A setting is present but cannot be used.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// The setting name.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
