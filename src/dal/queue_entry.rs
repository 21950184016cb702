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

//! Live queue operations: insert, atomic claim, cancellation and terminal
//! removal.
//!
//! The claim is the correctness core of the subsystem: flipping a row from
//! PENDING to IN_PROGRESS must be atomic at the storage layer so that two
//! concurrent workers can never claim the same entry. PostgreSQL uses
//! `FOR UPDATE SKIP LOCKED`; SQLite relies on transaction isolation together
//! with the single-connection pool. Terminal operations write the activity
//! row and delete the queue row in one transaction.

use super::models::{ActivityRow, NewQueueEntry, QueueRow};
use super::DAL;
use crate::database::schema::{task_activity, task_queue};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::QueueError;
use crate::models::activity::{ActivityEntry, ActivityStatus, TaskFailure};
use crate::models::queue_entry::{QueueEntry, QueueEntryStatus};
use diesel::prelude::*;

/// Outcome of a single-task cancellation attempt.
#[derive(Debug)]
pub enum CancelOutcome {
    /// The entry was pending; it is now canceled and recorded in history.
    Canceled(ActivityEntry),
    /// The entry is claimed by a worker; cancellation was refused.
    InProgress,
    /// No entry with this uuid exists.
    NotFound,
}

/// Row-level cancellation outcome, converted to [`CancelOutcome`] outside
/// the transaction closure.
enum RawCancel {
    Canceled(ActivityRow),
    InProgress,
    NotFound,
}

/// Data access layer for live queue entries.
#[derive(Clone)]
pub struct QueueEntryDAL<'a> {
    dal: &'a DAL,
}

impl<'a> QueueEntryDAL<'a> {
    /// Creates a new QueueEntryDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts a new PENDING entry.
    pub async fn create(&self, new_entry: NewQueueEntry) -> Result<QueueEntry, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.create_postgres(new_entry).await,
            self.create_sqlite(new_entry).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn create_postgres(&self, new_entry: NewQueueEntry) -> Result<QueueEntry, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let row = QueueRow::pending(&new_entry, UniversalTimestamp::now());
        let inserted = row.clone();
        conn.interact(move |conn| {
            diesel::insert_into(task_queue::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        inserted.try_into()
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite(&self, new_entry: NewQueueEntry) -> Result<QueueEntry, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let row = QueueRow::pending(&new_entry, UniversalTimestamp::now());
        let inserted = row.clone();
        conn.interact(move |conn| {
            diesel::insert_into(task_queue::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        inserted.try_into()
    }

    /// Inserts a batch of PENDING entries in one transaction.
    ///
    /// Either every entry is queued or none is.
    pub async fn create_batch(
        &self,
        new_entries: Vec<NewQueueEntry>,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.create_batch_postgres(new_entries).await,
            self.create_batch_sqlite(new_entries).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn create_batch_postgres(
        &self,
        new_entries: Vec<NewQueueEntry>,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let rows: Vec<QueueRow> = new_entries
            .iter()
            .map(|entry| QueueRow::pending(entry, now))
            .collect();
        let inserted = rows.clone();

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                for row in &rows {
                    diesel::insert_into(task_queue::table)
                        .values(row)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        inserted.into_iter().map(QueueEntry::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn create_batch_sqlite(
        &self,
        new_entries: Vec<NewQueueEntry>,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let rows: Vec<QueueRow> = new_entries
            .iter()
            .map(|entry| QueueRow::pending(entry, now))
            .collect();
        let inserted = rows.clone();

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                for row in &rows {
                    diesel::insert_into(task_queue::table)
                        .values(row)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        inserted.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Atomically claims the oldest PENDING entry for the given worker.
    ///
    /// Claim order is deterministic: ascending `created_at`, tie-broken by
    /// uuid. Returns `None` when no pending entry exists. The claimed entry
    /// has status IN_PROGRESS, the worker uuid recorded and `started_at`
    /// stamped.
    pub async fn claim_next_pending(
        &self,
        worker_uuid: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_next_pending_postgres(worker_uuid).await,
            self.claim_next_pending_sqlite(worker_uuid).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn claim_next_pending_postgres(
        &self,
        worker_uuid: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        use diesel::sql_types::BigInt;
        use diesel::sql_types::Text;

        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        #[derive(Debug, QueryableByName)]
        #[diesel(check_for_backend(diesel::pg::Pg))]
        struct ClaimedRow {
            #[diesel(sql_type = Text)]
            uuid: String,
            #[diesel(sql_type = Text)]
            task_type: String,
            #[diesel(sql_type = diesel::sql_types::Nullable<Text>)]
            component_uuid: Option<String>,
            #[diesel(sql_type = diesel::sql_types::Nullable<Text>)]
            submitter_login: Option<String>,
            #[diesel(sql_type = Text)]
            status: String,
            #[diesel(sql_type = diesel::sql_types::Nullable<Text>)]
            worker_uuid: Option<String>,
            #[diesel(sql_type = diesel::sql_types::Nullable<BigInt>)]
            started_at: Option<i64>,
            #[diesel(sql_type = BigInt)]
            created_at: i64,
            #[diesel(sql_type = BigInt)]
            updated_at: i64,
        }

        let worker = worker_uuid.to_string();
        let now = UniversalTimestamp::now().as_millis();

        // Single statement, atomic: FOR UPDATE SKIP LOCKED lets concurrent
        // workers pass over a row another transaction is claiming instead of
        // blocking on it.
        let claimed: Option<ClaimedRow> = conn
            .interact(move |conn| {
                diesel::sql_query(
                    r#"
                    WITH next_task AS (
                        SELECT uuid FROM task_queue
                        WHERE status = 'PENDING'
                        ORDER BY created_at ASC, uuid ASC
                        LIMIT 1
                        FOR UPDATE SKIP LOCKED
                    )
                    UPDATE task_queue
                    SET status = 'IN_PROGRESS', worker_uuid = $1, started_at = $2, updated_at = $3
                    FROM next_task
                    WHERE task_queue.uuid = next_task.uuid
                    RETURNING task_queue.uuid, task_queue.task_type, task_queue.component_uuid,
                              task_queue.submitter_login, task_queue.status, task_queue.worker_uuid,
                              task_queue.started_at, task_queue.created_at, task_queue.updated_at
                    "#,
                )
                .bind::<Text, _>(worker)
                .bind::<BigInt, _>(now)
                .bind::<BigInt, _>(now)
                .get_result(conn)
                .optional()
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        claimed
            .map(|row| {
                QueueEntry::try_from(QueueRow {
                    uuid: row.uuid,
                    task_type: row.task_type,
                    component_uuid: row.component_uuid,
                    submitter_login: row.submitter_login,
                    status: row.status,
                    worker_uuid: row.worker_uuid,
                    started_at: row.started_at,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
            })
            .transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn claim_next_pending_sqlite(
        &self,
        worker_uuid: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let worker = worker_uuid.to_string();

        // SQLite has no FOR UPDATE SKIP LOCKED; the transaction plus the
        // single-connection pool serialize concurrent claim attempts. The
        // status guard on the update makes the claim conditional either way.
        let row: Option<QueueRow> = conn
            .interact(move |conn| {
                conn.transaction::<Option<QueueRow>, diesel::result::Error, _>(|conn| {
                    let now = UniversalTimestamp::now().as_millis();

                    let candidate: Option<QueueRow> = task_queue::table
                        .filter(task_queue::status.eq(QueueEntryStatus::Pending.as_str()))
                        .order((task_queue::created_at.asc(), task_queue::uuid.asc()))
                        .first(conn)
                        .optional()?;

                    let mut row = match candidate {
                        Some(row) => row,
                        None => return Ok(None),
                    };

                    let claimed = diesel::update(
                        task_queue::table
                            .filter(task_queue::uuid.eq(row.uuid.clone()))
                            .filter(task_queue::status.eq(QueueEntryStatus::Pending.as_str())),
                    )
                    .set((
                        task_queue::status.eq(QueueEntryStatus::InProgress.as_str()),
                        task_queue::worker_uuid.eq(Some(worker.clone())),
                        task_queue::started_at.eq(Some(now)),
                        task_queue::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                    if claimed == 0 {
                        return Ok(None);
                    }

                    row.status = QueueEntryStatus::InProgress.as_str().to_string();
                    row.worker_uuid = Some(worker.clone());
                    row.started_at = Some(now);
                    row.updated_at = now;
                    Ok(Some(row))
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        row.map(QueueEntry::try_from).transpose()
    }

    /// Retrieves a queue entry by uuid.
    pub async fn find_by_uuid(
        &self,
        uuid: UniversalUuid,
    ) -> Result<Option<QueueEntry>, QueueError> {
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
    ) -> Result<Option<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let row: Option<QueueRow> = conn
            .interact(move |conn| task_queue::table.find(key).first(conn).optional())
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        row.map(QueueEntry::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn find_by_uuid_sqlite(
        &self,
        uuid: UniversalUuid,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let row: Option<QueueRow> = conn
            .interact(move |conn| task_queue::table.find(key).first(conn).optional())
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        row.map(QueueEntry::try_from).transpose()
    }

    /// Retrieves all queue entries in submission order (oldest first).
    pub async fn select_all_ascending(&self) -> Result<Vec<QueueEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.select_all_ascending_postgres().await,
            self.select_all_ascending_sqlite().await
        )
    }

    #[cfg(feature = "postgres")]
    async fn select_all_ascending_postgres(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let rows: Vec<QueueRow> = conn
            .interact(move |conn| {
                task_queue::table
                    .order((task_queue::created_at.asc(), task_queue::uuid.asc()))
                    .load(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    #[cfg(feature = "sqlite")]
    async fn select_all_ascending_sqlite(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let rows: Vec<QueueRow> = conn
            .interact(move |conn| {
                task_queue::table
                    .order((task_queue::created_at.asc(), task_queue::uuid.asc()))
                    .load(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    /// Terminally removes a queue entry: writes the activity row and deletes
    /// the queue row in one transaction.
    ///
    /// Returns the recorded activity entry, or `None` when no entry with
    /// this uuid exists (nothing is written in that case).
    pub async fn finish(
        &self,
        uuid: UniversalUuid,
        status: ActivityStatus,
        failure: Option<TaskFailure>,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.finish_postgres(uuid, status, failure).await,
            self.finish_sqlite(uuid, status, failure).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn finish_postgres(
        &self,
        uuid: UniversalUuid,
        status: ActivityStatus,
        failure: Option<TaskFailure>,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let activity: Option<ActivityRow> = conn
            .interact(move |conn| {
                conn.transaction::<Option<ActivityRow>, diesel::result::Error, _>(|conn| {
                    let row: Option<QueueRow> =
                        task_queue::table.find(key.clone()).first(conn).optional()?;

                    let row = match row {
                        Some(row) => row,
                        None => return Ok(None),
                    };

                    let activity = ActivityRow::from_queue_row(
                        &row,
                        status,
                        UniversalTimestamp::now(),
                        failure.as_ref(),
                    );
                    diesel::insert_into(task_activity::table)
                        .values(&activity)
                        .execute(conn)?;
                    diesel::delete(task_queue::table.find(key)).execute(conn)?;

                    Ok(Some(activity))
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        activity.map(ActivityEntry::try_from).transpose()
    }

    #[cfg(feature = "sqlite")]
    async fn finish_sqlite(
        &self,
        uuid: UniversalUuid,
        status: ActivityStatus,
        failure: Option<TaskFailure>,
    ) -> Result<Option<ActivityEntry>, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let activity: Option<ActivityRow> = conn
            .interact(move |conn| {
                conn.transaction::<Option<ActivityRow>, diesel::result::Error, _>(|conn| {
                    let row: Option<QueueRow> =
                        task_queue::table.find(key.clone()).first(conn).optional()?;

                    let row = match row {
                        Some(row) => row,
                        None => return Ok(None),
                    };

                    let activity = ActivityRow::from_queue_row(
                        &row,
                        status,
                        UniversalTimestamp::now(),
                        failure.as_ref(),
                    );
                    diesel::insert_into(task_activity::table)
                        .values(&activity)
                        .execute(conn)?;
                    diesel::delete(task_queue::table.find(key)).execute(conn)?;

                    Ok(Some(activity))
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        activity.map(ActivityEntry::try_from).transpose()
    }

    /// Cancels a single entry if it is still PENDING.
    ///
    /// The CANCELED activity row and the queue-row delete happen in one
    /// transaction. In-progress entries are refused; see [`CancelOutcome`].
    pub async fn cancel_pending(&self, uuid: UniversalUuid) -> Result<CancelOutcome, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.cancel_pending_postgres(uuid).await,
            self.cancel_pending_sqlite(uuid).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn cancel_pending_postgres(
        &self,
        uuid: UniversalUuid,
    ) -> Result<CancelOutcome, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let raw: RawCancel = conn
            .interact(move |conn| {
                conn.transaction::<RawCancel, diesel::result::Error, _>(|conn| {
                    let row: Option<QueueRow> =
                        task_queue::table.find(key.clone()).first(conn).optional()?;

                    let row = match row {
                        Some(row) => row,
                        None => return Ok(RawCancel::NotFound),
                    };
                    if row.status == QueueEntryStatus::InProgress.as_str() {
                        return Ok(RawCancel::InProgress);
                    }

                    let activity = ActivityRow::from_queue_row(
                        &row,
                        ActivityStatus::Canceled,
                        UniversalTimestamp::now(),
                        None,
                    );
                    diesel::insert_into(task_activity::table)
                        .values(&activity)
                        .execute(conn)?;
                    diesel::delete(task_queue::table.find(key)).execute(conn)?;

                    Ok(RawCancel::Canceled(activity))
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        raw.into_outcome()
    }

    #[cfg(feature = "sqlite")]
    async fn cancel_pending_sqlite(
        &self,
        uuid: UniversalUuid,
    ) -> Result<CancelOutcome, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let key = uuid.to_string();
        let raw: RawCancel = conn
            .interact(move |conn| {
                conn.transaction::<RawCancel, diesel::result::Error, _>(|conn| {
                    let row: Option<QueueRow> =
                        task_queue::table.find(key.clone()).first(conn).optional()?;

                    let row = match row {
                        Some(row) => row,
                        None => return Ok(RawCancel::NotFound),
                    };
                    if row.status == QueueEntryStatus::InProgress.as_str() {
                        return Ok(RawCancel::InProgress);
                    }

                    let activity = ActivityRow::from_queue_row(
                        &row,
                        ActivityStatus::Canceled,
                        UniversalTimestamp::now(),
                        None,
                    );
                    diesel::insert_into(task_activity::table)
                        .values(&activity)
                        .execute(conn)?;
                    diesel::delete(task_queue::table.find(key)).execute(conn)?;

                    Ok(RawCancel::Canceled(activity))
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        raw.into_outcome()
    }

    /// Cancels every qualifying entry, oldest first, in one transaction.
    ///
    /// PENDING entries always qualify; IN_PROGRESS entries only when
    /// `include_in_progress` is set. Returns the number of entries canceled.
    pub async fn cancel_all(&self, include_in_progress: bool) -> Result<usize, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.cancel_all_postgres(include_in_progress).await,
            self.cancel_all_sqlite(include_in_progress).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn cancel_all_postgres(&self, include_in_progress: bool) -> Result<usize, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| {
                conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                    let rows: Vec<QueueRow> = task_queue::table
                        .order((task_queue::created_at.asc(), task_queue::uuid.asc()))
                        .load(conn)?;

                    let now = UniversalTimestamp::now();
                    let mut canceled = 0;
                    for row in rows {
                        let in_progress =
                            row.status == QueueEntryStatus::InProgress.as_str();
                        if in_progress && !include_in_progress {
                            continue;
                        }

                        let activity = ActivityRow::from_queue_row(
                            &row,
                            ActivityStatus::Canceled,
                            now,
                            None,
                        );
                        diesel::insert_into(task_activity::table)
                            .values(&activity)
                            .execute(conn)?;
                        diesel::delete(task_queue::table.find(row.uuid.clone()))
                            .execute(conn)?;
                        canceled += 1;
                    }

                    Ok(canceled)
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn cancel_all_sqlite(&self, include_in_progress: bool) -> Result<usize, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| {
                conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                    let rows: Vec<QueueRow> = task_queue::table
                        .order((task_queue::created_at.asc(), task_queue::uuid.asc()))
                        .load(conn)?;

                    let now = UniversalTimestamp::now();
                    let mut canceled = 0;
                    for row in rows {
                        let in_progress =
                            row.status == QueueEntryStatus::InProgress.as_str();
                        if in_progress && !include_in_progress {
                            continue;
                        }

                        let activity = ActivityRow::from_queue_row(
                            &row,
                            ActivityStatus::Canceled,
                            now,
                            None,
                        );
                        diesel::insert_into(task_activity::table)
                            .values(&activity)
                            .execute(conn)?;
                        diesel::delete(task_queue::table.find(row.uuid.clone()))
                            .execute(conn)?;
                        canceled += 1;
                    }

                    Ok(canceled)
                })
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Returns IN_PROGRESS entries whose heartbeat (`updated_at`) is older
    /// than the cutoff back to PENDING, clearing the worker and start time.
    ///
    /// Returns the number of entries reset. This is the recovery path for
    /// claims abandoned by a crashed worker.
    pub async fn reset_stalled(&self, cutoff: UniversalTimestamp) -> Result<usize, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.reset_stalled_postgres(cutoff).await,
            self.reset_stalled_sqlite(cutoff).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn reset_stalled_postgres(
        &self,
        cutoff: UniversalTimestamp,
    ) -> Result<usize, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let cutoff_ms = cutoff.as_millis();
        let count = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().as_millis();
                diesel::update(
                    task_queue::table
                        .filter(task_queue::status.eq(QueueEntryStatus::InProgress.as_str()))
                        .filter(task_queue::updated_at.lt(cutoff_ms)),
                )
                .set((
                    task_queue::status.eq(QueueEntryStatus::Pending.as_str()),
                    task_queue::worker_uuid.eq(None::<String>),
                    task_queue::started_at.eq(None::<i64>),
                    task_queue::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn reset_stalled_sqlite(&self, cutoff: UniversalTimestamp) -> Result<usize, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let cutoff_ms = cutoff.as_millis();
        let count = conn
            .interact(move |conn| {
                let now = UniversalTimestamp::now().as_millis();
                diesel::update(
                    task_queue::table
                        .filter(task_queue::status.eq(QueueEntryStatus::InProgress.as_str()))
                        .filter(task_queue::updated_at.lt(cutoff_ms)),
                )
                .set((
                    task_queue::status.eq(QueueEntryStatus::Pending.as_str()),
                    task_queue::worker_uuid.eq(None::<String>),
                    task_queue::started_at.eq(None::<i64>),
                    task_queue::updated_at.eq(now),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Counts live entries with the given status (for monitoring).
    pub async fn count_by_status(&self, status: QueueEntryStatus) -> Result<i64, QueueError> {
        crate::dispatch_backend!(
            self.dal.backend(),
            self.count_by_status_postgres(status).await,
            self.count_by_status_sqlite(status).await
        )
    }

    #[cfg(feature = "postgres")]
    async fn count_by_status_postgres(
        &self,
        status: QueueEntryStatus,
    ) -> Result<i64, QueueError> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                task_queue::table
                    .filter(task_queue::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    #[cfg(feature = "sqlite")]
    async fn count_by_status_sqlite(&self, status: QueueEntryStatus) -> Result<i64, QueueError> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                task_queue::table
                    .filter(task_queue::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}

impl RawCancel {
    fn into_outcome(self) -> Result<CancelOutcome, QueueError> {
        match self {
            RawCancel::Canceled(row) => Ok(CancelOutcome::Canceled(row.try_into()?)),
            RawCancel::InProgress => Ok(CancelOutcome::InProgress),
            RawCancel::NotFound => Ok(CancelOutcome::NotFound),
        }
    }
}
