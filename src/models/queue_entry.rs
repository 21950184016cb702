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

//! Queue Entry Model
//!
//! This module defines the domain structures for live queue entries: tasks
//! that have been submitted but have not yet reached a terminal status.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a live queue entry.
///
/// Terminal statuses never appear here: a task leaves the queue the moment
/// it reaches one, and is recorded in the activity history instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueEntryStatus {
    /// Submitted, waiting to be claimed by a worker.
    Pending,
    /// Claimed by exactly one worker.
    InProgress,
}

impl QueueEntryStatus {
    /// The TEXT form stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Pending => "PENDING",
            QueueEntryStatus::InProgress => "IN_PROGRESS",
        }
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueEntryStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(QueueEntryStatus::Pending),
            "IN_PROGRESS" => Ok(QueueEntryStatus::InProgress),
            other => Err(QueueError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Represents a live queue entry (domain type).
///
/// One row per pending or in-progress task. Created on submit, mutated on
/// claim (status, worker, started_at), deleted on terminal removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique identifier of the task, assigned at submit time
    pub uuid: UniversalUuid,
    /// Tag identifying which processor handles the task
    pub task_type: String,
    /// The project/resource the task concerns, if any
    pub component_uuid: Option<String>,
    /// Login of the submitter, if known
    pub submitter_login: Option<String>,
    /// Current status of the entry
    pub status: QueueEntryStatus,
    /// Identifier of the worker that claimed the entry
    pub worker_uuid: Option<String>,
    /// When the entry was claimed; set if and only if the entry was claimed
    pub started_at: Option<UniversalTimestamp>,
    /// When the entry was submitted
    pub created_at: UniversalTimestamp,
    /// Last mutation time; doubles as the claim liveness heartbeat
    pub updated_at: UniversalTimestamp,
}
