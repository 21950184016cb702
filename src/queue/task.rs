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

//! Task and submission types.
//!
//! A [`TaskSubmission`] is the mutable carrier handed to callers before a
//! task exists; its uuid is pre-allocated by
//! [`TaskQueue::prepare_submission`](crate::queue::TaskQueue::prepare_submission)
//! and becomes the [`Task`] uuid on submit. A [`Task`] is immutable once
//! constructed.

use crate::database::universal_types::UniversalUuid;
use crate::models::queue_entry::QueueEntry;
use serde::{Deserialize, Serialize};

/// One unit of work submitted to the queue.
///
/// Immutable; the queue is the only component that constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    uuid: UniversalUuid,
    task_type: String,
    component_uuid: Option<String>,
    submitter_login: Option<String>,
}

impl Task {
    /// Unique identifier, assigned at submit time.
    pub fn uuid(&self) -> UniversalUuid {
        self.uuid
    }

    /// Tag identifying which processor handles the task.
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// The project/resource the task concerns, if any.
    pub fn component_uuid(&self) -> Option<&str> {
        self.component_uuid.as_deref()
    }

    /// Login of the submitter, if known.
    pub fn submitter_login(&self) -> Option<&str> {
        self.submitter_login.as_deref()
    }
}

impl From<&QueueEntry> for Task {
    fn from(entry: &QueueEntry) -> Self {
        Task {
            uuid: entry.uuid,
            task_type: entry.task_type.clone(),
            component_uuid: entry.component_uuid.clone(),
            submitter_login: entry.submitter_login.clone(),
        }
    }
}

/// Mutable builder for a task that does not exist yet.
///
/// Obtained from [`TaskQueue::prepare_submission`](crate::queue::TaskQueue::prepare_submission);
/// exactly one uuid is allocated per submission and reused as the task uuid.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    uuid: UniversalUuid,
    task_type: String,
    component_uuid: Option<String>,
    submitter_login: Option<String>,
}

impl TaskSubmission {
    pub(crate) fn new(uuid: UniversalUuid) -> Self {
        TaskSubmission {
            uuid,
            task_type: String::new(),
            component_uuid: None,
            submitter_login: None,
        }
    }

    /// The pre-allocated task uuid.
    pub fn uuid(&self) -> UniversalUuid {
        self.uuid
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn component_uuid(&self) -> Option<&str> {
        self.component_uuid.as_deref()
    }

    pub fn submitter_login(&self) -> Option<&str> {
        self.submitter_login.as_deref()
    }

    /// Sets the task type tag. Required before submit.
    pub fn set_type(&mut self, task_type: impl Into<String>) -> &mut Self {
        self.task_type = task_type.into();
        self
    }

    /// Sets the component the task concerns.
    pub fn set_component_uuid(&mut self, component_uuid: impl Into<String>) -> &mut Self {
        self.component_uuid = Some(component_uuid.into());
        self
    }

    /// Sets the submitter identity.
    pub fn set_submitter_login(&mut self, submitter_login: impl Into<String>) -> &mut Self {
        self.submitter_login = Some(submitter_login.into());
        self
    }
}
