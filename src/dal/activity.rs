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

//! Read access to the activity history.
//!
//! Activity rows are written by the queue-entry DAL inside the terminal
//! transaction; this DAL only reads them. The history is append-only, so
//! there are no update or delete operations here.

use super::models::ActivityRow;
use super::DAL;
use crate::database::schema::task_activity;
use crate::database::universal_types::UniversalUuid;
use crate::error::QueueError;
use crate::models::activity::{ActivityEntry, ActivityStatus};
use diesel::prelude::*;

/// Data access layer for activity history.
#[derive(Clone)]
pub struct ActivityDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ActivityDAL<'a> {
    /// Creates a new ActivityDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Retrieves an activity entry by task uuid.
    pub async fn find_by_uuid(
        &self,
        uuid: UniversalUuid,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.find_by_uuid_postgres(uuid).await,
            self.find_by_uuid_sqlite(uuid).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn find_by_uuid_postgres(
        &self,
        uuid: UniversalUuid,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let row: Option<ActivityRow> = conn
            .interact(move |conn| task_activity::table.find(key).first(conn).optional())
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        row.map(ActivityEntry::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn find_by_uuid_sqlite(
        &self,
        uuid: UniversalUuid,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let row: Option<ActivityRow> = conn
            .interact(move |conn| task_activity::table.find(key).first(conn).optional())
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        row.map(ActivityEntry::try_from).transpose()
    }

    /// Retrieves the most recent activity entries, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ActivityEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.list_recent_postgres(limit).await,
            self.list_recent_sqlite(limit).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn list_recent_postgres(&self, limit: i64) -> Result<Vec<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let rows: Vec<ActivityRow> = conn
            .interact(move |conn| {
                task_activity::table
                    .order((task_activity::created_at.desc(), task_activity::uuid.desc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(ActivityEntry::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_recent_sqlite(&self, limit: i64) -> Result<Vec<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let rows: Vec<ActivityRow> = conn
            .interact(move |conn| {
                task_activity::table
                    .order((task_activity::created_at.desc(), task_activity::uuid.desc()))
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(ActivityEntry::try_from).collect()
    }

    /// Counts activity entries with the given terminal status (for monitoring).
    pub async fn count_by_status(&self, status: ActivityStatus) -> Result<i64, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.count_by_status_postgres(status).await,
            self.count_by_status_sqlite(status).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn count_by_status_postgres(&self, status: ActivityStatus) -> Result<i64, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                task_activity::table
                    .filter(task_activity::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn count_by_status_sqlite(&self, status: ActivityStatus) -> Result<i64, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                task_activity::table
                    .filter(task_activity::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
