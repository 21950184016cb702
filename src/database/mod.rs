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

//! Database layer: connection pooling, embedded migrations, Diesel schema
//! and the universal domain types shared by both backends.

pub mod connection;
pub mod schema;
pub mod universal_types;

pub use connection::{AnyPool, BackendType, Database};
pub use universal_types::{UniversalTimestamp, UniversalUuid};

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

/// Embedded PostgreSQL migrations.
#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Embedded SQLite migrations.
#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs pending migrations on a raw PostgreSQL connection.
///
/// Used by test fixtures and setup tooling that hold a connection outside
/// the pool. Application code should prefer [`Database::run_migrations`].
#[cfg(feature = "postgres")]
pub fn run_migrations_postgres(conn: &mut diesel::PgConnection) -> Result<(), String> {
    conn.run_pending_migrations(POSTGRES_MIGRATIONS)
        .map(|_| ())
        .map_err(|e| format!("Failed to run PostgreSQL migrations: {}", e))
}

/// Runs pending migrations on a raw SQLite connection.
#[cfg(feature = "sqlite")]
pub fn run_migrations_sqlite(conn: &mut diesel::SqliteConnection) -> Result<(), String> {
    conn.run_pending_migrations(SQLITE_MIGRATIONS)
        .map(|_| ())
        .map_err(|e| format!("Failed to run SQLite migrations: {}", e))
}
