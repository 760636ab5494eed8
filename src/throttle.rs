// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serialized, rate-limited controller calls.
//!
//! The controller misbehaves when commands arrive back to back. The
//! [`CommandThrottler`] lets one command through at a time and holds the
//! gate for a fixed spacing after each one completes, whether it succeeded
//! or not.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;

/// Default minimum spacing between controller commands.
pub const DEFAULT_COMMAND_SPACING: Duration = Duration::from_millis(20);

/// Serializes commands and spaces them apart.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vantage_bridge::throttle::CommandThrottler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let throttler = CommandThrottler::new(Duration::from_millis(5));
///
/// let value = throttler.issue(async { Ok::<_, std::io::Error>(42) }).await;
/// assert_eq!(value.unwrap(), 42);
/// # }
/// ```
#[derive(Debug)]
pub struct CommandThrottler {
    gate: Mutex<()>,
    spacing: Duration,
}

impl CommandThrottler {
    /// Creates a throttler with the given spacing.
    #[must_use]
    pub fn new(spacing: Duration) -> Self {
        Self {
            gate: Mutex::new(()),
            spacing,
        }
    }

    /// Returns the configured spacing.
    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Runs `command` once no other command holds the gate.
    ///
    /// The gate stays held for the spacing after the command completes,
    /// then the command's result is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the command's own error.
    pub async fn issue<T, E, Fut>(&self, command: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.gate.lock().await;
        let result = command.await;
        if !self.spacing.is_zero() {
            tokio::time::sleep(self.spacing).await;
        }
        result
    }
}

impl Default for CommandThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_SPACING)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex as SyncMutex;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn commands_are_spaced_apart() {
        let throttler = Arc::new(CommandThrottler::default());
        let starts = Arc::new(SyncMutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let throttler = Arc::clone(&throttler);
            let starts = Arc::clone(&starts);
            tasks.push(tokio::spawn(async move {
                throttler
                    .issue(async {
                        starts.lock().push(Instant::now());
                        Ok::<_, ()>(())
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let starts = starts.lock();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_COMMAND_SPACING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn errors_are_returned_and_still_spaced() {
        let throttler = CommandThrottler::new(Duration::from_millis(50));
        let start = Instant::now();

        let result = throttler.issue(async { Err::<(), _>("refused") }).await;

        assert_eq!(result, Err("refused"));
        assert_eq!(Instant::now() - start, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_spacing_does_not_sleep() {
        let throttler = CommandThrottler::new(Duration::ZERO);
        let start = Instant::now();

        throttler.issue(async { Ok::<_, ()>(()) }).await.unwrap();

        assert_eq!(Instant::now(), start);
    }
}
