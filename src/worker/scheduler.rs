/*
 *  Copyright 2025 Grindstone contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Periodic driver for a worker.
//!
//! A scheduler owns one worker and invokes it on a fixed cadence (first
//! tick immediately, no initial delay). On every wake-up the backlog is
//! drained: the worker is invoked again as long as it reports a processed
//! task, so a burst of submissions does not wait one period per task.
//! An out-of-band [`ProcessingScheduler::request_processing`] trigger
//! shares the same worker logic as the periodic cadence.
//!
//! Running several schedulers against one queue requires one worker each;
//! the queue's atomic claim is the only coordination between them.

use crate::queue::TaskQueue;
use crate::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Configuration for the processing scheduler.
///
/// # Construction
///
/// Use [`SchedulerConfig::builder()`] to create a configuration:
///
/// ```rust,ignore
/// let config = SchedulerConfig::builder()
///     .poll_interval(Duration::from_secs(2))
///     .enable_recovery(false)
///     .build();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SchedulerConfig {
    poll_interval: Duration,
    enable_recovery: bool,
    stale_task_age: Duration,
    recovery_interval: Duration,
}

impl SchedulerConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// How often the worker is invoked when no trigger arrives.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether stalled-claim recovery runs.
    pub fn enable_recovery(&self) -> bool {
        self.enable_recovery
    }

    /// Heartbeat age after which an in-progress claim counts as abandoned.
    pub fn stale_task_age(&self) -> Duration {
        self.stale_task_age
    }

    /// How often to check for abandoned claims.
    pub fn recovery_interval(&self) -> Duration {
        self.recovery_interval
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfigBuilder::default().build()
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self {
            config: SchedulerConfig {
                poll_interval: Duration::from_secs(10),
                enable_recovery: true,
                stale_task_age: Duration::from_secs(30 * 60),
                recovery_interval: Duration::from_secs(5 * 60),
            },
        }
    }
}

impl SchedulerConfigBuilder {
    /// Sets the worker poll interval.
    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    /// Enables or disables stalled-claim recovery.
    pub fn enable_recovery(mut self, value: bool) -> Self {
        self.config.enable_recovery = value;
        self
    }

    /// Sets the heartbeat age after which a claim counts as abandoned.
    pub fn stale_task_age(mut self, value: Duration) -> Self {
        self.config.stale_task_age = value;
        self
    }

    /// Sets the recovery check interval.
    pub fn recovery_interval(mut self, value: Duration) -> Self {
        self.config.recovery_interval = value;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

/// Periodic and on-demand driver for one [`Worker`].
pub struct ProcessingScheduler {
    worker: Arc<Worker>,
    queue: Arc<TaskQueue>,
    config: SchedulerConfig,
    wakeup: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ProcessingScheduler {
    /// Creates a scheduler for the given worker. Call
    /// [`start`](Self::start) to begin processing.
    pub fn new(worker: Arc<Worker>, queue: Arc<TaskQueue>, config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        ProcessingScheduler {
            worker,
            queue,
            config,
            wakeup: Arc::new(Notify::new()),
            shutdown_tx,
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Spawns the scheduling loop. The first worker invocation happens
    /// immediately. A second call while running is a no-op.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            warn!("Processing scheduler already started");
            return;
        }

        let worker = Arc::clone(&self.worker);
        let queue = Arc::clone(&self.queue);
        let config = self.config.clone();
        let wakeup = Arc::clone(&self.wakeup);
        let shutdown_rx = self.shutdown_tx.subscribe();

        *handle = Some(tokio::spawn(run_loop(
            worker,
            queue,
            config,
            wakeup,
            shutdown_rx,
        )));
        info!("Processing scheduler started");
    }

    /// Requests an immediate processing cycle, out of band with the
    /// periodic cadence (the "analyze now" path).
    ///
    /// Safe to call from any thread at any time; invocations are stateless
    /// and claim atomicity in the queue makes overlapping triggers harmless.
    pub fn request_processing(&self) {
        self.wakeup.notify_one();
    }

    /// Stops the scheduling loop and waits for it to finish. A task the
    /// worker currently holds is driven to its terminal status first.
    pub async fn stop(&self) {
        let handle = {
            let mut guard = self.handle.lock().await;
            guard.take()
        };

        if let Some(handle) = handle {
            let _ = self.shutdown_tx.send(true);
            let _ = handle.await;
            info!("Processing scheduler stopped");
        }
    }
}

async fn run_loop(
    worker: Arc<Worker>,
    queue: Arc<TaskQueue>,
    config: SchedulerConfig,
    wakeup: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.poll_interval());
    let mut recovery = tokio::time::interval(config.recovery_interval());

    loop {
        tokio::select! {
            _ = interval.tick() => drain_queue(&worker).await,
            _ = wakeup.notified() => drain_queue(&worker).await,
            _ = recovery.tick(), if config.enable_recovery() => {
                if let Err(e) = queue.recover_stalled(config.stale_task_age()).await {
                    warn!("Stalled-task recovery failed: {}", e);
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// Invokes the worker until it reports an empty queue.
///
/// Errors end the cycle; the next tick retries with no further backoff.
async fn drain_queue(worker: &Worker) {
    loop {
        match worker.find_and_process_task().await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("Task processing cycle failed: {}", e);
                break;
            }
        }
    }
}
