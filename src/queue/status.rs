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

//! Aggregate queue counters for operational dashboards.
//!
//! Counters are process-local atomics, not part of the correctness
//! contract. They track work received, work in flight and terminal outcomes
//! with cumulative processing time per outcome.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read-mostly aggregate metrics maintained by the queue.
#[derive(Debug, Default)]
pub struct QueueStatus {
    received: AtomicU64,
    in_progress: AtomicU64,
    success: AtomicU64,
    error: AtomicU64,
    success_processing_time_ms: AtomicU64,
    error_processing_time_ms: AtomicU64,
}

/// Point-in-time copy of the queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatusSnapshot {
    pub received: u64,
    pub in_progress: u64,
    pub success: u64,
    pub error: u64,
    pub success_processing_time_ms: u64,
    pub error_processing_time_ms: u64,
}

impl QueueStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one submitted task.
    pub fn add_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one claimed task.
    pub fn add_in_progress(&self) {
        self.in_progress.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one successful terminal removal with its processing time.
    pub fn add_success(&self, processing_time_ms: u64) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.success_processing_time_ms
            .fetch_add(processing_time_ms, Ordering::Relaxed);
        self.release_in_progress();
    }

    /// Records one failed terminal removal with its processing time.
    pub fn add_error(&self, processing_time_ms: u64) {
        self.error.fetch_add(1, Ordering::Relaxed);
        self.error_processing_time_ms
            .fetch_add(processing_time_ms, Ordering::Relaxed);
        self.release_in_progress();
    }

    /// Decrements the in-flight gauge, saturating at zero.
    ///
    /// A task removed without ever being claimed (e.g. canceled-then-removed
    /// by an admin path) must not drive the gauge negative.
    fn release_in_progress(&self) {
        let _ = self
            .in_progress
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            });
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> QueueStatusSnapshot {
        QueueStatusSnapshot {
            received: self.received.load(Ordering::Relaxed),
            in_progress: self.in_progress.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            success_processing_time_ms: self.success_processing_time_ms.load(Ordering::Relaxed),
            error_processing_time_ms: self.error_processing_time_ms.load(Ordering::Relaxed),
        }
    }
}
