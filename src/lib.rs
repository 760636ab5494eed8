// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `vantage_bridge` - bridges a Vantage lighting controller to MQTT.
//!
//! The controller reports load levels only on a best-effort basis and keypad
//! presses not at all, except as lines in its diagnostic log. This library
//! recovers keypad activity from those lines and keeps a consistent view of
//! every load by combining push reports, command echoes and targeted polls.
//!
//! # Building Blocks
//!
//! - [`tap`]: diagnostic line capture and keypad event classification
//! - [`state`]: per-load state cache with timestamp ordering
//! - [`scheduler`]: fallback polls shortly after presses ("sniper" polling)
//!   and on an interval
//! - [`throttle`]: serialized, rate-limited controller calls
//! - [`bridge`]: the coordinator that ties everything together
//! - [`protocol`]: MQTT topics, Home Assistant discovery and the broker
//!   connection
//!
//! The controller itself is reached through the [`Controller`] trait,
//! implemented by the caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use vantage_bridge::bridge::{BridgeConfig, run_mqtt_bridge};
//! use vantage_bridge::controller::Controller;
//! use vantage_bridge::tap::{DiagnosticTapLayer, line_channel};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! # async fn example(controller: impl Controller) -> vantage_bridge::Result<()> {
//! let config = BridgeConfig::from_env()?;
//!
//! // Forward the controller client's diagnostic log into the bridge
//! let (sink, lines) = line_channel();
//! let subscriber = tracing_subscriber::registry()
//!     .with(DiagnosticTapLayer::new(sink).with_target_prefix("vantage_client"));
//! tracing::subscriber::set_global_default(subscriber).ok();
//!
//! let (_stop, shutdown) = tokio::sync::watch::channel(false);
//! run_mqtt_bridge(controller, config, lines, shutdown).await
//! # }
//! ```
//!
//! ## Driving the Coordinator Directly
//!
//! ```ignore
//! use std::sync::Arc;
//! use vantage_bridge::bridge::{BridgeConfig, BridgeCoordinator};
//! use vantage_bridge::event::EventBus;
//!
//! let events = EventBus::new();
//! let mut updates = events.subscribe();
//! let coordinator = Arc::new(BridgeCoordinator::new(controller, &BridgeConfig::new("10.0.0.5"), events));
//!
//! coordinator.rediscover().await?;
//! coordinator.handle_line("EL: 42 Button.GetState 1");
//!
//! while let Ok(event) = updates.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod bridge;
pub mod controller;
pub mod error;
pub mod event;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod tap;
pub mod throttle;
pub mod types;

pub use bridge::{BridgeConfig, BridgeCoordinator, run_mqtt_bridge};
pub use controller::{Controller, LevelReport};
pub use error::{ConfigError, ControllerError, Error, ProtocolError, Result, ValueError};
pub use event::{BridgeEvent, EventBus};
pub use protocol::{MqttBus, StatePublisher, Topics};
pub use types::Level;
