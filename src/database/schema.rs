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

//! Diesel schema for the queue tables.
//!
//! Column types are restricted to TEXT and BIGINT so the same row structs
//! serve both the PostgreSQL and SQLite backends. UUIDs are stored in their
//! hyphenated text form; timestamps as milliseconds since the Unix epoch.

diesel::table! {
    /// Live queue: one row per pending or in-progress task.
    task_queue (uuid) {
        uuid -> Text,
        task_type -> Text,
        component_uuid -> Nullable<Text>,
        submitter_login -> Nullable<Text>,
        status -> Text,
        worker_uuid -> Nullable<Text>,
        started_at -> Nullable<BigInt>,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    /// Append-only history of tasks that reached a terminal status.
    task_activity (uuid) {
        uuid -> Text,
        task_type -> Text,
        component_uuid -> Nullable<Text>,
        submitter_login -> Nullable<Text>,
        status -> Text,
        worker_uuid -> Nullable<Text>,
        submitted_at -> BigInt,
        started_at -> Nullable<BigInt>,
        finished_at -> BigInt,
        execution_time_ms -> Nullable<BigInt>,
        error_message -> Nullable<Text>,
        error_details -> Nullable<Text>,
        created_at -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(task_queue, task_activity);
