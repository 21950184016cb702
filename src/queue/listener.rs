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

//! Queue removal listeners.

use crate::error::ListenerError;
use crate::models::activity::ActivityStatus;
use crate::queue::task::Task;
use async_trait::async_trait;

/// Callback invoked after a task reaches a terminal status through
/// [`TaskQueue::remove`](crate::queue::TaskQueue::remove).
///
/// Listeners run in registration order, after the terminal transaction has
/// committed, once per removed task. An error returned by a listener
/// propagates to the caller of `remove` and aborts the remaining listeners:
/// listener failures are program bugs and are kept visible rather than
/// swallowed.
#[async_trait]
pub trait QueueListener: Send + Sync {
    async fn on_removed(&self, task: &Task, status: ActivityStatus) -> Result<(), ListenerError>;
}
