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

//! Activity Model
//!
//! This module defines the domain structures for the activity history: an
//! append-only record of every task that reached a terminal status. Rows are
//! written once, inside the same transaction that deletes the corresponding
//! queue entry, and are never updated afterwards.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Terminal status of a task, recorded in the activity history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityStatus {
    /// All processing completed without error.
    Success,
    /// Processing raised an error.
    Failed,
    /// The task was canceled before or instead of completing.
    Canceled,
}

impl ActivityStatus {
    /// The TEXT form stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Success => "SUCCESS",
            ActivityStatus::Failed => "FAILED",
            ActivityStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(ActivityStatus::Success),
            "FAILED" => Ok(ActivityStatus::Failed),
            "CANCELED" => Ok(ActivityStatus::Canceled),
            other => Err(QueueError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Failure data persisted with a FAILED activity entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Human-readable failure message
    pub message: String,
    /// Structured detail, typically the JSON-encoded error source chain
    pub details: Option<String>,
}

impl TaskFailure {
    /// Builds failure data from any error, capturing the display message and
    /// the source chain as structured JSON detail.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        let details = if chain.is_empty() {
            None
        } else {
            Some(serde_json::json!({ "causes": chain }).to_string())
        };

        TaskFailure {
            message: error.to_string(),
            details,
        }
    }
}

/// Represents an activity entry (domain type).
///
/// Copies the fields of the queue entry it replaces and adds the terminal
/// outcome: final status, finish time and execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique identifier of the task; same value the queue entry carried
    pub uuid: UniversalUuid,
    /// Tag identifying which processor handled the task
    pub task_type: String,
    /// The project/resource the task concerned, if any
    pub component_uuid: Option<String>,
    /// Login of the submitter, if known
    pub submitter_login: Option<String>,
    /// Terminal status
    pub status: ActivityStatus,
    /// Identifier of the worker that processed the task, if it was claimed
    pub worker_uuid: Option<String>,
    /// When the task was submitted
    pub submitted_at: UniversalTimestamp,
    /// When the task was claimed, if it was claimed
    pub started_at: Option<UniversalTimestamp>,
    /// When the task reached its terminal status
    pub finished_at: UniversalTimestamp,
    /// `finished_at - started_at`, when the task was claimed
    pub execution_time_ms: Option<i64>,
    /// Failure message for FAILED entries
    pub error_message: Option<String>,
    /// Structured failure detail for FAILED entries
    pub error_details: Option<String>,
    /// When the activity row was written
    pub created_at: UniversalTimestamp,
}
