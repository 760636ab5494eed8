// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic availability and diagnostics reporting.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::watch;
use tokio::time::Instant;

use super::BridgeCoordinator;
use crate::controller::Controller;
use crate::error::ProtocolError;
use crate::protocol::{BusPublisher, StatePublisher};

/// One round of health figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Time since the bridge started.
    pub uptime: Duration,
    /// Messages accepted by the bus so far.
    pub messages_published: u64,
    /// Number of known loads.
    pub entity_count: usize,
    /// Wall-clock time of the last successful poll.
    pub last_poll: Option<DateTime<Utc>>,
}

impl HealthReport {
    /// Publishes `online` and the diagnostic values.
    ///
    /// `entity_count` is retained; the other values are not.
    ///
    /// # Errors
    ///
    /// Stops at the first message the bus rejects.
    pub async fn publish<P: BusPublisher>(
        &self,
        publisher: &StatePublisher<P>,
    ) -> Result<(), ProtocolError> {
        publisher.publish_online().await?;
        publisher
            .publish_diagnostic("uptime_s", self.uptime.as_secs().to_string(), false)
            .await?;
        publisher
            .publish_diagnostic(
                "messages_published_total",
                self.messages_published.to_string(),
                false,
            )
            .await?;
        publisher
            .publish_diagnostic("entity_count", self.entity_count.to_string(), true)
            .await?;
        if let Some(last_poll) = self.last_poll {
            publisher
                .publish_diagnostic(
                    "last_poll",
                    last_poll.to_rfc3339_opts(SecondsFormat::Secs, true),
                    false,
                )
                .await?;
        }
        Ok(())
    }
}

/// Publishes a [`HealthReport`] every `interval` while the bus is connected.
pub async fn run_health_loop<P: BusPublisher, C: Controller>(
    publisher: &StatePublisher<P>,
    coordinator: &BridgeCoordinator<C>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let started = Instant::now();

    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }

        if !publisher.bus().is_connected() {
            continue;
        }

        let report = HealthReport {
            uptime: started.elapsed(),
            messages_published: publisher.messages_published(),
            entity_count: coordinator.entity_count(),
            last_poll: coordinator.scheduler().last_poll(),
        };
        if let Err(e) = report.publish(publisher).await {
            tracing::debug!(error = %e, "Health report not published");
        }
    }
}
