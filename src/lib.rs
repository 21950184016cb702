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

//! # Grindstone
//!
//! Durable compute-engine task queue for code analysis platforms: a
//! single-producer/multiple-consumer work queue backed by a relational
//! database (PostgreSQL or SQLite, selected at runtime), with
//! at-most-one-in-flight-per-task claiming, pause/resume controls, an
//! append-only activity history, a sequential step-pipeline executor with
//! profiling, and a periodic worker scheduler with an immediate trigger.
//!
//! # Architecture
//!
//! - [`queue::TaskQueue`] — submit, claim (`peek`), cancel, terminal
//!   removal; the atomic PENDING -> IN_PROGRESS transition at the storage
//!   layer is the subsystem's central correctness property.
//! - [`executor::StepExecutor`] — runs the ordered step pipeline of one
//!   claimed task, timing each step and aborting on the first failure.
//! - [`worker::Worker`] — claims one task per invocation and dispatches it
//!   to a processor resolved from the task's type tag.
//! - [`worker::ProcessingScheduler`] — fixed-cadence driver with an
//!   out-of-band "run now" trigger and stalled-claim recovery.
//! - [`dal::DAL`] — the narrow storage contract, one transaction per queue
//!   operation, with per-backend implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use grindstone::{Database, ProcessorRegistry, TaskQueue, Worker};
//! use std::sync::Arc;
//!
//! let database = Database::new("postgres://localhost:5432", "quality", 10);
//! database.run_migrations().await?;
//!
//! let queue = Arc::new(TaskQueue::new(database));
//! let mut submission = queue.prepare_submission();
//! submission.set_type("report").set_component_uuid("proj-A");
//! let task = queue.submit(submission).await?;
//! ```

pub mod dal;
pub mod database;
pub mod error;
pub mod executor;
pub mod models;
pub mod queue;
pub mod worker;

pub use database::{Database, UniversalTimestamp, UniversalUuid};
pub use error::{ExecutorError, ListenerError, ProcessorError, QueueError, StepError};
pub use executor::{ComputationStep, ExecutionListener, StepExecutor, StepTimings};
pub use models::{ActivityEntry, ActivityStatus, QueueEntry, QueueEntryStatus, TaskFailure};
pub use queue::{QueueListener, QueueStatus, QueueStatusSnapshot, Task, TaskQueue, TaskSubmission};
pub use worker::{
    ProcessingScheduler, ProcessorRegistry, SchedulerConfig, TaskProcessor, Worker,
};

/// Initializes tracing for binaries and tests.
///
/// Uses the given filter directive, falling back to `RUST_LOG` and then to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match filter {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
