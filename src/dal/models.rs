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

//! Row structs for the queue tables.
//!
//! Columns are restricted to TEXT and BIGINT, so one Queryable/Insertable
//! struct per table serves both backends. Conversion to/from the domain
//! types (typed uuids, typed timestamps, status enums) happens here, at the
//! DAL boundary.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::QueueError;
use crate::models::activity::{ActivityEntry, ActivityStatus, TaskFailure};
use crate::models::queue_entry::{QueueEntry, QueueEntryStatus};
use diesel::prelude::*;

/// Fields required to insert a new queue entry.
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    /// Pre-allocated task uuid
    pub uuid: UniversalUuid,
    /// Tag identifying which processor handles the task
    pub task_type: String,
    /// The project/resource the task concerns, if any
    pub component_uuid: Option<String>,
    /// Login of the submitter, if known
    pub submitter_login: Option<String>,
}

/// Row of the `task_queue` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::database::schema::task_queue)]
pub struct QueueRow {
    pub uuid: String,
    pub task_type: String,
    pub component_uuid: Option<String>,
    pub submitter_login: Option<String>,
    pub status: String,
    pub worker_uuid: Option<String>,
    pub started_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl QueueRow {
    /// Builds the PENDING row inserted at submit time.
    pub fn pending(entry: &NewQueueEntry, now: UniversalTimestamp) -> Self {
        QueueRow {
            uuid: entry.uuid.to_string(),
            task_type: entry.task_type.clone(),
            component_uuid: entry.component_uuid.clone(),
            submitter_login: entry.submitter_login.clone(),
            status: QueueEntryStatus::Pending.as_str().to_string(),
            worker_uuid: None,
            started_at: None,
            created_at: now.as_millis(),
            updated_at: now.as_millis(),
        }
    }
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = QueueError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        Ok(QueueEntry {
            uuid: UniversalUuid::parse_str(&row.uuid)?,
            task_type: row.task_type,
            component_uuid: row.component_uuid,
            submitter_login: row.submitter_login,
            status: row.status.parse()?,
            worker_uuid: row.worker_uuid,
            started_at: row.started_at.map(UniversalTimestamp::from_millis),
            created_at: UniversalTimestamp::from_millis(row.created_at),
            updated_at: UniversalTimestamp::from_millis(row.updated_at),
        })
    }
}

/// Row of the `task_activity` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::database::schema::task_activity)]
pub struct ActivityRow {
    pub uuid: String,
    pub task_type: String,
    pub component_uuid: Option<String>,
    pub submitter_login: Option<String>,
    pub status: String,
    pub worker_uuid: Option<String>,
    pub submitted_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: i64,
    pub execution_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub created_at: i64,
}

impl ActivityRow {
    /// Builds the terminal activity row for a queue entry.
    ///
    /// Execution time is `finished_at - started_at` and is only present when
    /// the entry was claimed; it is clamped to zero against clock skew.
    pub fn from_queue_row(
        row: &QueueRow,
        status: ActivityStatus,
        finished_at: UniversalTimestamp,
        failure: Option<&TaskFailure>,
    ) -> Self {
        let finished_ms = finished_at.as_millis();
        ActivityRow {
            uuid: row.uuid.clone(),
            task_type: row.task_type.clone(),
            component_uuid: row.component_uuid.clone(),
            submitter_login: row.submitter_login.clone(),
            status: status.as_str().to_string(),
            worker_uuid: row.worker_uuid.clone(),
            submitted_at: row.created_at,
            started_at: row.started_at,
            finished_at: finished_ms,
            execution_time_ms: row.started_at.map(|started| (finished_ms - started).max(0)),
            error_message: failure.map(|f| f.message.clone()),
            error_details: failure.and_then(|f| f.details.clone()),
            created_at: finished_ms,
        }
    }
}

impl TryFrom<ActivityRow> for ActivityEntry {
    type Error = QueueError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(ActivityEntry {
            uuid: UniversalUuid::parse_str(&row.uuid)?,
            task_type: row.task_type,
            component_uuid: row.component_uuid,
            submitter_login: row.submitter_login,
            status: row.status.parse()?,
            worker_uuid: row.worker_uuid,
            submitted_at: UniversalTimestamp::from_millis(row.submitted_at),
            started_at: row.started_at.map(UniversalTimestamp::from_millis),
            finished_at: UniversalTimestamp::from_millis(row.finished_at),
            execution_time_ms: row.execution_time_ms,
            error_message: row.error_message,
            error_details: row.error_details,
            created_at: UniversalTimestamp::from_millis(row.created_at),
        })
    }
}
