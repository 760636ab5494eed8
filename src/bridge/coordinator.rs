// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge coordinator.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use super::BridgeConfig;
use crate::controller::{Controller, LevelReport};
use crate::error::{ControllerError, Error, Result};
use crate::event::{BridgeEvent, EventBus};
use crate::protocol::{CommandKind, LoadCommand};
use crate::registry::Registry;
use crate::scheduler::{ReconciliationScheduler, SchedulerConfig, SchedulerHandle};
use crate::state::{DeviceStateCache, LoadDescriptor};
use crate::tap::{
    ActionClassifier, DiagnosticLineExtractor, DiscoveredKey, EventExtractor, LineStream,
    TapAction, TapEvent,
};
use crate::throttle::CommandThrottler;
use crate::types::Level;

/// Inputs consumed by [`BridgeCoordinator::run`].
#[derive(Debug)]
pub struct BridgeIo {
    /// Diagnostic lines, usually fed by a [`LineSink`](crate::tap::LineSink).
    pub lines: LineStream,
    /// Parsed load commands from the bus.
    pub commands: mpsc::Receiver<LoadCommand>,
}

/// What the main loop picked up.
enum Step {
    Line(Option<String>),
    Push(std::result::Result<LevelReport, RecvError>),
    Shutdown,
}

/// Reconciles controller state and keypad activity into [`BridgeEvent`]s.
///
/// The coordinator owns the state cache and the current [`Registry`]
/// snapshot. Three inputs feed it:
///
/// - diagnostic lines, classified into keypad taps that arm the scheduler
/// - best-effort push reports from the controller
/// - load commands, issued through the [`CommandThrottler`]
///
/// The [`ReconciliationScheduler`] adds full polls on top. Every accepted
/// level goes through [`DeviceStateCache::record_level`], which drops
/// anything older than what a load already shows.
pub struct BridgeCoordinator<C> {
    controller: Arc<C>,
    registry: RwLock<Arc<Registry>>,
    cache: DeviceStateCache,
    classifier: ActionClassifier,
    extractor: Box<dyn EventExtractor>,
    scheduler: SchedulerHandle,
    scheduler_config: SchedulerConfig,
    throttler: CommandThrottler,
    events: EventBus,
    discovered: Mutex<HashSet<DiscoveredKey>>,
    descriptors: Mutex<Vec<LoadDescriptor>>,
    learn_mode: bool,
}

impl<C: Controller> BridgeCoordinator<C> {
    /// Creates a coordinator with an empty registry.
    ///
    /// Call [`rediscover`](Self::rediscover) before use so loads and
    /// keypads are known.
    #[must_use]
    pub fn new(controller: C, config: &BridgeConfig, events: EventBus) -> Self {
        Self::with_shared_controller(Arc::new(controller), config, events)
    }

    /// Creates a coordinator around an already shared controller.
    #[must_use]
    pub fn with_shared_controller(
        controller: Arc<C>,
        config: &BridgeConfig,
        events: EventBus,
    ) -> Self {
        Self {
            controller,
            registry: RwLock::new(Arc::new(Registry::default())),
            cache: DeviceStateCache::new(events.clone()),
            classifier: ActionClassifier::new()
                .with_station_filter(config.include_stations().iter().copied()),
            extractor: Box::new(DiagnosticLineExtractor::new()),
            scheduler: SchedulerHandle::new(),
            scheduler_config: config.scheduler().clone(),
            throttler: CommandThrottler::new(config.command_spacing()),
            events,
            discovered: Mutex::new(HashSet::new()),
            descriptors: Mutex::new(Vec::new()),
            learn_mode: config.learn_mode(),
        }
    }

    /// Replaces the diagnostic line extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl EventExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the controller.
    #[must_use]
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Returns the current registry snapshot.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read())
    }

    /// Returns the state cache.
    #[must_use]
    pub fn cache(&self) -> &DeviceStateCache {
        &self.cache
    }

    /// Returns the scheduler handle.
    #[must_use]
    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the number of known loads.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns the descriptors of the last discovery.
    #[must_use]
    pub fn descriptors(&self) -> Vec<LoadDescriptor> {
        self.descriptors.lock().clone()
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Processes one diagnostic line.
    ///
    /// A press arms the reconciliation scheduler. Every classified event is
    /// published as [`BridgeEvent::Tap`]; in learn mode the first sighting of
    /// a control is also published as [`BridgeEvent::ControlDiscovered`].
    pub fn handle_line(&self, line: &str) -> Option<TapEvent> {
        let raw = self.extractor.extract(line)?;
        let registry = self.registry();
        let event = self.classifier.classify_opt(&raw, &registry)?;

        if event.action == TapAction::Press
            && self.scheduler_config.enabled
            && self.scheduler.trigger()
        {
            tracing::info!(
                target_id = %event.target(),
                position = event.position,
                "Press detected, reconciliation armed"
            );
        }

        self.events.publish(BridgeEvent::Tap(event.clone()));

        if self.learn_mode && self.discovered.lock().insert(event.discovered_key()) {
            self.events
                .publish(BridgeEvent::ControlDiscovered(event.clone()));
        }

        Some(event)
    }

    /// Executes a load command.
    ///
    /// The controller call runs through the throttler. On success the new
    /// level is recorded with the time the call was issued; on failure the
    /// cache is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLoad`] if the load is not in the current
    /// discovery snapshot, or the controller error.
    pub async fn handle_command(&self, command: LoadCommand) -> Result<()> {
        let load_id = command.load_id;
        if !self.cache.contains(load_id) {
            tracing::warn!(load_id, "Command for unknown load");
            return Err(Error::UnknownLoad(load_id));
        }

        let outcome = self
            .throttler
            .issue(async {
                let issued_at = Instant::now();
                let level = match command.kind {
                    CommandKind::TurnOff => {
                        self.controller.turn_off(load_id).await?;
                        Level::MIN
                    }
                    CommandKind::TurnOn => {
                        let level = self.cache.restore_level(load_id);
                        self.controller.set_level(load_id, level).await?;
                        level
                    }
                    CommandKind::SetBrightness(brightness) => {
                        let level = Level::from_brightness(brightness);
                        self.controller.set_level(load_id, level).await?;
                        level
                    }
                };
                self.cache.record_level(load_id, level, issued_at);
                Ok::<_, ControllerError>(level)
            })
            .await;

        match outcome {
            Ok(level) => {
                tracing::debug!(load_id, %level, "Command applied");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(load_id, error = %e, "Command failed");
                Err(e.into())
            }
        }
    }

    /// Records a push report from the controller.
    ///
    /// An accepted report counts as live activity and postpones fallback
    /// polls.
    pub fn apply_push(&self, report: LevelReport) {
        if self
            .cache
            .record_level(report.load_id, report.level, Instant::now())
            .is_some()
        {
            self.scheduler.mark_live();
        }
    }

    /// Fetches the full state once and records every report.
    ///
    /// All reports share the time the fetch started, so a command or push
    /// report that landed during the fetch is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns the controller error; the cache is left unchanged.
    pub async fn poll_once(&self) -> std::result::Result<usize, ControllerError> {
        let started_at = Instant::now();
        let reports = self
            .throttler
            .issue(self.controller.fetch_full_state())
            .await?;

        let total = reports.len();
        let applied = reports
            .into_iter()
            .filter(|r| self.cache.record_level(r.load_id, r.level, started_at).is_some())
            .count();

        tracing::info!(reports = total, applied, "Full state poll complete");
        Ok(applied)
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Rebuilds the registry and the cache from the controller.
    ///
    /// Publishes [`BridgeEvent::LoadsDiscovered`] followed by the state of
    /// every load. Keypad controls will be announced again on next use.
    ///
    /// # Errors
    ///
    /// Returns the controller error; the previous snapshot stays in place.
    pub async fn rediscover(&self) -> std::result::Result<Vec<LoadDescriptor>, ControllerError> {
        let registry = Registry::discover(self.controller.as_ref()).await?;
        let descriptors = self.cache.replace_from_registry(&registry);

        *self.registry.write() = Arc::new(registry);
        self.discovered.lock().clear();
        self.descriptors.lock().clone_from(&descriptors);

        self.events
            .publish(BridgeEvent::LoadsDiscovered(descriptors.clone()));
        self.cache.publish_all();

        Ok(descriptors)
    }

    /// Announces the known loads and their state again, and forgets which
    /// keypad controls were announced.
    pub fn reannounce(&self) {
        self.discovered.lock().clear();
        let descriptors = self.descriptors();
        tracing::info!(loads = descriptors.len(), "Re-announcing entities");
        self.events.publish(BridgeEvent::LoadsDiscovered(descriptors));
        self.cache.publish_all();
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Runs the bridge until `shutdown` is signalled.
    ///
    /// Spawns the reconciliation scheduler (when enabled) and a command task
    /// that executes commands one at a time in arrival order. Lines and push
    /// reports are handled on the calling task. On shutdown the command in
    /// flight, if any, completes before this returns.
    pub async fn run(self: Arc<Self>, io: BridgeIo, mut shutdown: watch::Receiver<bool>) {
        let BridgeIo {
            mut lines,
            commands,
        } = io;

        let scheduler_task = self.scheduler_config.enabled.then(|| {
            let scheduler = ReconciliationScheduler::with_handle(
                self.scheduler_config.clone(),
                self.scheduler.clone(),
            );
            let this = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                scheduler
                    .run(
                        || {
                            let this = Arc::clone(&this);
                            async move { this.poll_once().await.map(|_| ()) }
                        },
                        shutdown,
                    )
                    .await;
            })
        });

        let command_task = {
            let this = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.process_commands(commands, shutdown).await })
        };

        let mut push = self.controller.state_changes();
        let mut lines_open = true;

        if !*shutdown.borrow_and_update() {
            tracing::info!(push = push.is_some(), "Bridge running");

            loop {
                let step = tokio::select! {
                    line = lines.recv(), if lines_open => Step::Line(line),
                    report = recv_push(push.as_mut()), if push.is_some() => Step::Push(report),
                    _ = shutdown.changed() => Step::Shutdown,
                };

                match step {
                    Step::Line(Some(line)) => {
                        self.handle_line(&line);
                    }
                    Step::Line(None) => {
                        tracing::debug!("Diagnostic line stream closed");
                        lines_open = false;
                    }
                    Step::Push(Ok(report)) => self.apply_push(report),
                    Step::Push(Err(RecvError::Lagged(skipped))) => {
                        tracing::warn!(skipped, "Push reports lagged, requesting a poll");
                        if self.scheduler_config.enabled {
                            self.scheduler.trigger();
                        }
                    }
                    Step::Push(Err(RecvError::Closed)) => {
                        tracing::warn!("Controller push channel closed");
                        push = None;
                    }
                    Step::Shutdown => break,
                }
            }
        }

        if let Err(e) = command_task.await {
            tracing::warn!(error = %e, "Command task ended abnormally");
        }
        if let Some(task) = scheduler_task
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        tracing::info!("Bridge stopped");
    }

    async fn process_commands(
        &self,
        mut commands: mpsc::Receiver<LoadCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if *shutdown.borrow_and_update() {
            return;
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    // Errors are logged by handle_command
                    Some(command) => { let _ = self.handle_command(command).await; }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
    }
}

impl<C> std::fmt::Debug for BridgeCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeCoordinator")
            .field("loads", &self.cache.len())
            .field("phase", &self.scheduler.phase())
            .field("learn_mode", &self.learn_mode)
            .finish_non_exhaustive()
    }
}

async fn recv_push(
    receiver: Option<&mut broadcast::Receiver<LevelReport>>,
) -> std::result::Result<LevelReport, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
