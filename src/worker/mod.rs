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

//! Worker Module
//!
//! One worker invocation claims at most one task and drives it to a
//! terminal status. Processor failures never escape the worker: a worker
//! that leaked them would silently stop the scheduler loop that invokes it.
//! Peek failures are treated as "nothing to do this cycle" for the same
//! reason. Queue-layer failures during terminal removal do propagate; a
//! missing entry there is a logic bug the caller must see.

pub mod processor;
pub mod scheduler;

pub use processor::{ProcessorRegistry, TaskProcessor};
pub use scheduler::{ProcessingScheduler, SchedulerConfig, SchedulerConfigBuilder};

use crate::error::{ProcessorError, QueueError};
use crate::models::activity::{ActivityStatus, TaskFailure};
use crate::queue::{Task, TaskQueue};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Claims and processes one task per invocation.
///
/// Workers are stateless between invocations; any number may run against
/// the same queue, each with its own uuid stamped on the claims it makes.
pub struct Worker {
    queue: Arc<TaskQueue>,
    processors: Arc<ProcessorRegistry>,
    uuid: String,
}

impl Worker {
    /// Creates a worker with a fresh worker uuid.
    pub fn new(queue: Arc<TaskQueue>, processors: Arc<ProcessorRegistry>) -> Self {
        Worker {
            queue,
            processors,
            uuid: Uuid::new_v4().to_string(),
        }
    }

    /// The identifier stamped on claims made by this worker.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Makes one attempt to process at most one task.
    ///
    /// Returns `Ok(true)` when a task was claimed and driven to a terminal
    /// status (SUCCESS or FAILED), `Ok(false)` when there was nothing to do.
    /// A failed peek is logged and reported as nothing-to-do so the caller's
    /// cycle continues; errors from the terminal removal itself propagate.
    pub async fn find_and_process_task(&self) -> Result<bool, QueueError> {
        let task = match self.queue.peek(&self.uuid).await {
            Ok(Some(task)) => task,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(worker_uuid = %self.uuid, "Failed to peek the queue: {}", e);
                return Ok(false);
            }
        };

        match self.process(&task).await {
            Ok(()) => {
                self.queue
                    .remove(&task, ActivityStatus::Success, None)
                    .await?;
                info!(
                    uuid = %task.uuid(),
                    task_type = task.task_type(),
                    worker_uuid = %self.uuid,
                    "Task processed"
                );
            }
            Err(e) => {
                error!(
                    uuid = %task.uuid(),
                    task_type = task.task_type(),
                    worker_uuid = %self.uuid,
                    "Task processing failed: {}", e
                );
                let failure = TaskFailure::from_error(e.as_ref());
                self.queue
                    .remove(&task, ActivityStatus::Failed, Some(failure))
                    .await?;
            }
        }

        Ok(true)
    }

    async fn process(&self, task: &Task) -> Result<(), ProcessorError> {
        let processor = self.processors.get(task.task_type()).ok_or_else(|| {
            format!(
                "no processor registered for task type '{}'",
                task.task_type()
            )
        })?;
        processor.process(task).await
    }
}
