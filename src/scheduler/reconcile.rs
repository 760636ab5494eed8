// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reconciliation loop.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::watch;
use tokio::time::Instant;

use super::{Phase, SchedulerConfig, SchedulerHandle};

/// Why the loop woke up.
enum Wake {
    Trigger,
    Interval,
    Shutdown,
}

/// Runs fallback polls on an interval and shortly after keypad presses.
///
/// A press wakes the loop, which waits the settle delay so that scenes can
/// finish fading, then fetches the full state once. Presses that arrive
/// while a cycle is pending are folded into it. Before every poll the loop
/// checks live activity: if confirmed state arrived within the quiet time,
/// the poll is skipped.
///
/// The loop never runs two polls at once.
#[derive(Debug)]
pub struct ReconciliationScheduler {
    config: SchedulerConfig,
    handle: SchedulerHandle,
}

impl ReconciliationScheduler {
    /// Creates a scheduler with a fresh handle.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_handle(config, SchedulerHandle::new())
    }

    /// Creates a scheduler driven by an existing handle.
    #[must_use]
    pub fn with_handle(config: SchedulerConfig, handle: SchedulerHandle) -> Self {
        Self { config, handle }
    }

    /// Returns a handle for triggering polls and reporting activity.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs the loop until `shutdown` changes or its sender is dropped.
    ///
    /// `poll` performs one full state fetch. Success refreshes live
    /// activity; failure is logged and treated like a skipped poll.
    pub async fn run<F, Fut, E>(self, mut poll: F, mut shutdown: watch::Receiver<bool>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        if *shutdown.borrow_and_update() {
            return;
        }

        tracing::info!(
            interval_s = self.config.interval.as_secs(),
            settle_s = self.config.settle_delay.as_secs(),
            quiet_s = self.config.quiet_time.as_secs(),
            "Starting reconciliation loop"
        );

        if !self.config.startup_delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.config.startup_delay) => {}
                _ = shutdown.changed() => return,
            }
        }

        loop {
            let wake = tokio::select! {
                () = self.handle.woken() => Wake::Trigger,
                () = tokio::time::sleep(self.config.interval) => Wake::Interval,
                _ = shutdown.changed() => Wake::Shutdown,
            };

            match (wake, self.handle.phase()) {
                (Wake::Shutdown, _) => break,
                (_, Phase::Settling) => {
                    tracing::info!(
                        settle_ms = self.config.settle_delay.as_millis(),
                        "Press detected, polling after settle delay"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(self.config.settle_delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
                // Permit left over from a trigger that raced an interval wake
                (Wake::Trigger, _) => continue,
                (Wake::Interval, _) => {}
            }

            let since_live =
                Instant::now().saturating_duration_since(self.handle.last_live_activity());
            if since_live < self.config.quiet_time {
                tracing::debug!(
                    since_live_ms = since_live.as_millis(),
                    "Skipping poll, live activity is recent"
                );
                self.handle.set_phase(Phase::Idle);
                continue;
            }

            self.handle.set_phase(Phase::Polling);
            let stopping = self.poll_once(&mut poll, &mut shutdown).await;
            self.handle.set_phase(Phase::Idle);

            if stopping {
                break;
            }
        }

        self.handle.set_phase(Phase::Idle);
        tracing::info!("Reconciliation loop stopped");
    }

    /// Runs one poll. Returns `true` if shutdown was requested meanwhile.
    async fn poll_once<F, Fut, E>(
        &self,
        poll: &mut F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        tracing::info!("Running reconciliation poll");

        let fut = poll();
        tokio::pin!(fut);

        let (outcome, stopping) = tokio::select! {
            result = &mut fut => (Some(result), false),
            _ = shutdown.changed() => {
                match tokio::time::timeout(self.config.shutdown_grace, &mut fut).await {
                    Ok(result) => (Some(result), true),
                    Err(_) => {
                        tracing::warn!("Abandoning in-flight poll at shutdown");
                        (None, true)
                    }
                }
            }
        };

        match outcome {
            Some(Ok(())) => self.handle.record_poll_success(),
            Some(Err(e)) => tracing::warn!(error = %e, "Reconciliation poll failed"),
            None => {}
        }

        stopping
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::error::ControllerError;
    use crate::scheduler::DEFAULT_SHUTDOWN_GRACE;

    /// Records the instant of every poll; fails while `fail` is set.
    #[derive(Clone, Default)]
    struct Recorder {
        polls: Arc<Mutex<Vec<Instant>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl Recorder {
        fn polls(&self) -> Vec<Instant> {
            self.polls.lock().clone()
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::default().with_startup_delay(Duration::ZERO)
    }

    /// Polls every second with no quiet window.
    fn fast_config() -> SchedulerConfig {
        config()
            .with_interval(Duration::from_secs(1))
            .with_quiet_time(Duration::ZERO)
    }

    fn spawn(
        config: SchedulerConfig,
        recorder: &Recorder,
    ) -> (SchedulerHandle, watch::Sender<bool>, JoinHandle<()>) {
        let scheduler = ReconciliationScheduler::new(config);
        let handle = scheduler.handle();
        let (tx, rx) = watch::channel(false);
        let recorder = recorder.clone();

        let task = tokio::spawn(scheduler.run(
            move || {
                let recorder = recorder.clone();
                async move {
                    recorder.polls.lock().push(Instant::now());
                    if *recorder.fail.lock() {
                        Err(ControllerError::NotConnected)
                    } else {
                        Ok(())
                    }
                }
            },
            rx,
        ));

        (handle, tx, task)
    }

    async fn settle() {
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_polls_after_settle_delay() {
        let recorder = Recorder::default();
        let start = Instant::now();
        let (handle, tx, task) = spawn(config(), &recorder);
        settle().await;

        assert!(handle.trigger());
        assert_eq!(handle.phase(), Phase::Settling);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!handle.trigger());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(recorder.polls(), vec![start + Duration::from_secs(5)]);
        assert_eq!(handle.phase(), Phase::Idle);
        assert!(handle.last_poll().is_some());

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interval_polls_without_trigger() {
        let recorder = Recorder::default();
        let start = Instant::now();
        let (_handle, tx, task) = spawn(config(), &recorder);

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(
            recorder.polls(),
            vec![start + Duration::from_secs(90), start + Duration::from_secs(180)]
        );

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn recent_activity_skips_poll() {
        let recorder = Recorder::default();
        let (handle, tx, task) = spawn(config(), &recorder);

        tokio::time::sleep(Duration::from_secs(88)).await;
        handle.mark_live();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(recorder.polls().is_empty());
        assert_eq!(handle.phase(), Phase::Idle);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_skips_when_live_during_settle() {
        let recorder = Recorder::default();
        let (handle, tx, task) = spawn(config(), &recorder);
        tokio::time::sleep(Duration::from_secs(30)).await;

        handle.trigger();
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.mark_live();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(recorder.polls().is_empty());
        assert_eq!(handle.phase(), Phase::Idle);
        assert!(handle.trigger());

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_does_not_stop_the_loop() {
        let recorder = Recorder::default();
        *recorder.fail.lock() = true;
        let (handle, tx, task) = spawn(config(), &recorder);

        tokio::time::sleep(Duration::from_secs(91)).await;
        assert_eq!(recorder.polls().len(), 1);
        assert!(handle.last_poll().is_none());

        // A failed poll is not live activity, so the next trigger polls
        handle.trigger();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(recorder.polls().len(), 2);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn startup_delay_defers_first_cycle() {
        let recorder = Recorder::default();
        let start = Instant::now();
        let (handle, tx, task) = spawn(SchedulerConfig::default(), &recorder);
        settle().await;

        // Trigger during the startup delay is served once the loop starts
        assert!(handle.trigger());
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(recorder.polls(), vec![start + Duration::from_secs(15)]);

        tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_settle_delay() {
        let recorder = Recorder::default();
        let (handle, tx, task) = spawn(config(), &recorder);
        settle().await;

        handle.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert!(recorder.polls().is_empty());
        assert_eq!(handle.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_the_loop() {
        let recorder = Recorder::default();
        let (_handle, tx, task) = spawn(config(), &recorder);
        settle().await;

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_poll_gets_grace_period() {
        let finished = Arc::new(Mutex::new(0_u32));
        let scheduler = ReconciliationScheduler::new(fast_config());
        let (tx, rx) = watch::channel(false);

        let counter = Arc::clone(&finished);
        let task = tokio::spawn(scheduler.run(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    *counter.lock() += 1;
                    Ok::<(), ControllerError>(())
                }
            },
            rx,
        ));

        // First poll starts at t=1 and would finish at t=2
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(*finished.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_is_abandoned_after_grace() {
        let finished = Arc::new(Mutex::new(false));
        let scheduler = ReconciliationScheduler::new(fast_config());
        let (tx, rx) = watch::channel(false);

        let flag = Arc::clone(&finished);
        let task = tokio::spawn(scheduler.run(
            move || {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    *flag.lock() = true;
                    Ok::<(), ControllerError>(())
                }
            },
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let stop_at = Instant::now();
        tx.send(true).unwrap();
        task.await.unwrap();

        assert!(!*finished.lock());
        assert_eq!(Instant::now() - stop_at, DEFAULT_SHUTDOWN_GRACE);
    }
}
