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

//! Data Access Layer with runtime backend selection
//!
//! This module provides the storage contract the queue operates through:
//! insert, atomic claim, select-by-uuid, select-all-ascending, terminal
//! removal with activity recording, and stalled-claim recovery. Each DAL
//! operation executes inside a single transaction and dispatches to the
//! appropriate backend-specific implementation based on the connection type.

use crate::database::{AnyPool, BackendType, Database};

pub mod activity;
pub mod models;
pub mod queue_entry;

pub use activity::ActivityDAL;
pub use queue_entry::{CancelOutcome, QueueEntryDAL};

/// Helper macro for dispatching operations based on backend type.
///
/// # Example
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.create_postgres(entry).await,
///     self.create_sqlite(entry).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}

/// The Data Access Layer struct.
///
/// Provides access to all database operations through a single interface
/// that works with both PostgreSQL and SQLite backends.
///
/// # Thread Safety
///
/// The `DAL` struct is `Clone` and can be safely shared between threads.
/// Each clone references the same underlying database connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.database.pool()
    }

    /// Returns a queue entry DAL for live queue operations.
    pub fn queue_entry(&self) -> QueueEntryDAL {
        QueueEntryDAL::new(self)
    }

    /// Returns an activity DAL for history operations.
    pub fn activity(&self) -> ActivityDAL {
        ActivityDAL::new(self)
    }
}
