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

//! Task Queue Module
//!
//! This module provides the producer/consumer facade over the durable queue
//! store: submit, claim (peek), cancel, terminal removal and pause controls.
//!
//! The queue itself holds no in-process locks around claiming; the atomic
//! PENDING -> IN_PROGRESS transition inside the storage layer is the only
//! required mutual exclusion, which makes concurrent workers correct without
//! further coordination. Pause switches are independent process-wide atomics:
//! flipping them never affects a worker that already holds a claimed task.

pub mod listener;
pub mod status;
pub mod task;

pub use listener::QueueListener;
pub use status::{QueueStatus, QueueStatusSnapshot};
pub use task::{Task, TaskSubmission};

use crate::dal::models::NewQueueEntry;
use crate::dal::{CancelOutcome, DAL};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::database::Database;
use crate::error::QueueError;
use crate::models::activity::{ActivityEntry, ActivityStatus, TaskFailure};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Producer/consumer facade over the durable task queue.
///
/// # Thread Safety
///
/// Share a single instance behind an `Arc`; every operation takes `&self`.
/// Submission and claiming may run concurrently from any number of tasks.
pub struct TaskQueue {
    dal: DAL,
    submit_paused: AtomicBool,
    peek_paused: AtomicBool,
    status: Arc<QueueStatus>,
    listeners: Vec<Arc<dyn QueueListener>>,
}

impl TaskQueue {
    /// Creates a queue over the given database, with no listeners.
    pub fn new(database: Database) -> Self {
        Self::with_listeners(database, Vec::new())
    }

    /// Creates a queue with removal listeners, invoked in the given order.
    pub fn with_listeners(database: Database, listeners: Vec<Arc<dyn QueueListener>>) -> Self {
        TaskQueue {
            dal: DAL::new(database),
            submit_paused: AtomicBool::new(false),
            peek_paused: AtomicBool::new(false),
            status: Arc::new(QueueStatus::new()),
            listeners,
        }
    }

    /// Registers an additional removal listener.
    ///
    /// Requires exclusive access; register listeners before sharing the
    /// queue behind an `Arc`.
    pub fn register_listener(&mut self, listener: Arc<dyn QueueListener>) {
        self.listeners.push(listener);
    }

    /// Allocates a fresh uuid for a task about to be submitted.
    ///
    /// Does not touch storage; the uuid becomes the task uuid on submit.
    pub fn prepare_submission(&self) -> TaskSubmission {
        TaskSubmission::new(UniversalUuid::new_v4())
    }

    /// Submits a task: inserts a PENDING queue entry and returns the
    /// immutable [`Task`].
    ///
    /// Fails with [`QueueError::SubmissionRejected`] while submission is
    /// paused and [`QueueError::InvalidSubmission`] when the task type is
    /// empty. If the insert fails nothing is recorded, including counters.
    pub async fn submit(&self, submission: TaskSubmission) -> Result<Task, QueueError> {
        self.check_accepts_submissions()?;
        let new_entry = validate_submission(submission)?;

        let entry = self.dal.queue_entry().create(new_entry).await?;
        self.status.add_received();

        debug!(
            uuid = %entry.uuid,
            task_type = %entry.task_type,
            "Task submitted"
        );
        Ok(Task::from(&entry))
    }

    /// Submits a batch of tasks in one transaction: either every submission
    /// is queued or none is.
    pub async fn submit_all(
        &self,
        submissions: Vec<TaskSubmission>,
    ) -> Result<Vec<Task>, QueueError> {
        self.check_accepts_submissions()?;
        let new_entries = submissions
            .into_iter()
            .map(validate_submission)
            .collect::<Result<Vec<_>, _>>()?;

        let entries = self.dal.queue_entry().create_batch(new_entries).await?;
        for entry in &entries {
            self.status.add_received();
            debug!(
                uuid = %entry.uuid,
                task_type = %entry.task_type,
                "Task submitted"
            );
        }
        Ok(entries.iter().map(Task::from).collect())
    }

    /// Claims the oldest PENDING task for the given worker, if any.
    ///
    /// Returns `None` (not an error) while peeking is paused or when no
    /// pending entry exists. The claim is atomic at the storage layer: a
    /// concurrent `peek` can never return the same entry.
    pub async fn peek(&self, worker_uuid: &str) -> Result<Option<Task>, QueueError> {
        if self.is_peek_paused() {
            debug!("Peek is paused, no task claimed");
            return Ok(None);
        }

        let claimed = self.dal.queue_entry().claim_next_pending(worker_uuid).await?;
        match claimed {
            Some(entry) => {
                self.status.add_in_progress();
                info!(
                    uuid = %entry.uuid,
                    task_type = %entry.task_type,
                    worker_uuid,
                    "Task state change: PENDING -> IN_PROGRESS"
                );
                Ok(Some(Task::from(&entry)))
            }
            None => Ok(None),
        }
    }

    /// Cancels a task that is still PENDING.
    ///
    /// Returns `true` when the task was canceled and recorded in the
    /// activity history, `false` when no entry with this uuid exists. An
    /// IN_PROGRESS task can not be canceled: live task state can not be
    /// safely revoked from under an active worker.
    pub async fn cancel(&self, uuid: UniversalUuid) -> Result<bool, QueueError> {
        match self.dal.queue_entry().cancel_pending(uuid).await? {
            CancelOutcome::Canceled(activity) => {
                info!(uuid = %activity.uuid, "Task state change: PENDING -> CANCELED");
                Ok(true)
            }
            CancelOutcome::InProgress => Err(QueueError::TaskInProgress { uuid }),
            CancelOutcome::NotFound => Ok(false),
        }
    }

    /// Cancels every qualifying entry in submission order and returns the
    /// number canceled.
    ///
    /// PENDING entries always qualify. Pass `include_in_progress` only when
    /// no worker is running: the precondition is documented, not enforced by
    /// a lock, and is how an operator clears the queue before shutdown.
    pub async fn cancel_all(&self, include_in_progress: bool) -> Result<usize, QueueError> {
        let canceled = self.dal.queue_entry().cancel_all(include_in_progress).await?;
        if canceled > 0 {
            info!(canceled, include_in_progress, "Canceled queued tasks");
        }
        Ok(canceled)
    }

    /// Terminally removes a task: writes the activity entry and deletes the
    /// queue entry in one transaction, then notifies listeners.
    ///
    /// `failure` may only be provided with [`ActivityStatus::Failed`].
    /// Fails with [`QueueError::TaskNotFound`] when the entry vanished
    /// underneath (e.g. a concurrent duplicate removal), which indicates a
    /// logic bug rather than a recoverable condition.
    ///
    /// Listeners run after the transaction commits, in registration order;
    /// an error from one listener propagates and aborts the rest.
    pub async fn remove(
        &self,
        task: &Task,
        status: ActivityStatus,
        failure: Option<TaskFailure>,
    ) -> Result<ActivityEntry, QueueError> {
        if failure.is_some() && status != ActivityStatus::Failed {
            return Err(QueueError::InvalidArgument {
                message: "error can be provided only when status is FAILED".to_string(),
            });
        }

        let activity = self
            .dal
            .queue_entry()
            .finish(task.uuid(), status, failure)
            .await?
            .ok_or(QueueError::TaskNotFound { uuid: task.uuid() })?;

        let processing_time_ms = activity.execution_time_ms.unwrap_or(0) as u64;
        match status {
            ActivityStatus::Success => self.status.add_success(processing_time_ms),
            ActivityStatus::Failed => self.status.add_error(processing_time_ms),
            ActivityStatus::Canceled => {}
        }

        info!(
            uuid = %activity.uuid,
            status = %activity.status,
            execution_time_ms = activity.execution_time_ms,
            "Task state change: IN_PROGRESS -> terminal"
        );

        for listener in &self.listeners {
            listener
                .on_removed(task, status)
                .await
                .map_err(QueueError::Listener)?;
        }

        Ok(activity)
    }

    /// Returns abandoned IN_PROGRESS entries to PENDING.
    ///
    /// An entry counts as abandoned when its heartbeat (`updated_at`) is
    /// older than `max_age`, which happens when the claiming worker died
    /// without reaching a terminal removal. Returns the number of entries
    /// recovered.
    pub async fn recover_stalled(&self, max_age: Duration) -> Result<usize, QueueError> {
        let now = UniversalTimestamp::now();
        let cutoff = UniversalTimestamp::from_millis(now.as_millis() - max_age.as_millis() as i64);
        let recovered = self.dal.queue_entry().reset_stalled(cutoff).await?;
        if recovered > 0 {
            info!(recovered, "Returned stalled in-progress tasks to PENDING");
        }
        Ok(recovered)
    }

    /// Stops accepting new submissions. Claiming is unaffected.
    pub fn pause_submit(&self) {
        self.submit_paused.store(true, Ordering::SeqCst);
        info!("Task submission paused");
    }

    /// Resumes accepting submissions.
    pub fn resume_submit(&self) {
        self.submit_paused.store(false, Ordering::SeqCst);
        info!("Task submission resumed");
    }

    pub fn is_submit_paused(&self) -> bool {
        self.submit_paused.load(Ordering::SeqCst)
    }

    /// Suppresses claiming. Submission and in-flight tasks are unaffected.
    pub fn pause_peek(&self) {
        self.peek_paused.store(true, Ordering::SeqCst);
        info!("Task claiming paused");
    }

    /// Resumes claiming.
    pub fn resume_peek(&self) {
        self.peek_paused.store(false, Ordering::SeqCst);
        info!("Task claiming resumed");
    }

    pub fn is_peek_paused(&self) -> bool {
        self.peek_paused.load(Ordering::SeqCst)
    }

    /// The queue's aggregate counters.
    pub fn status(&self) -> Arc<QueueStatus> {
        Arc::clone(&self.status)
    }

    /// The underlying data access layer (read access for monitoring).
    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    fn check_accepts_submissions(&self) -> Result<(), QueueError> {
        if self.is_submit_paused() {
            return Err(QueueError::SubmissionRejected);
        }
        Ok(())
    }
}

/// Checks submission invariants and converts to the DAL insert type.
fn validate_submission(submission: TaskSubmission) -> Result<NewQueueEntry, QueueError> {
    if submission.uuid().as_uuid().is_nil() {
        return Err(QueueError::InvalidSubmission {
            message: "task uuid must not be nil".to_string(),
        });
    }
    if submission.task_type().is_empty() {
        return Err(QueueError::InvalidSubmission {
            message: "task type must not be empty".to_string(),
        });
    }

    Ok(NewQueueEntry {
        uuid: submission.uuid(),
        task_type: submission.task_type().to_string(),
        component_uuid: submission.component_uuid().map(str::to_string),
        submitter_login: submission.submitter_login().map(str::to_string),
    })
}
