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

//! Error types for the queue, executor and worker subsystems.

use crate::database::universal_types::UniversalUuid;
use thiserror::Error;

/// Error type produced by [`ComputationStep`](crate::executor::ComputationStep)
/// implementations. Steps are supplied by callers, so any error is accepted.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type produced by [`TaskProcessor`](crate::worker::TaskProcessor)
/// implementations.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type produced by [`QueueListener`](crate::queue::QueueListener)
/// implementations.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`TaskQueue`](crate::queue::TaskQueue) operations and the
/// underlying data access layer.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Submission attempted while the queue is submit-paused.
    #[error("compute engine does not currently accept new tasks")]
    SubmissionRejected,

    /// Submission carried invalid data (e.g. an empty task type).
    #[error("invalid task submission: {message}")]
    InvalidSubmission { message: String },

    /// Cancellation attempted against a task a worker already claimed.
    #[error("task {uuid} is in progress and can not be canceled")]
    TaskInProgress { uuid: UniversalUuid },

    /// Terminal removal attempted for a task no longer in the queue. This
    /// indicates a logic bug (double removal) or external tampering.
    #[error("task {uuid} is not in the queue")]
    TaskNotFound { uuid: UniversalUuid },

    /// An argument combination the queue rejects, such as providing error
    /// data with a non-FAILED terminal status.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Failed to obtain a connection from the pool.
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    /// A query or transaction failed.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A registered listener failed during terminal removal. Not caught by
    /// the queue; listener failures are program bugs and stay visible.
    #[error("queue listener failed: {0}")]
    Listener(#[source] ListenerError),

    /// A stored uuid column did not parse back into a UUID.
    #[error("malformed uuid in storage: {0}")]
    UuidParse(#[from] uuid::Error),

    /// A stored status column held an unknown value.
    #[error("unknown status '{value}' in storage")]
    InvalidStatus { value: String },
}

/// Errors raised by the [`StepExecutor`](crate::executor::StepExecutor).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A step of the pipeline failed; the remaining steps were not run.
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },
}
