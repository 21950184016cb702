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

//! Task processors and the type-keyed registry the worker dispatches through.

use crate::error::ProcessorError;
use crate::queue::Task;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

/// Processes tasks of one task type.
///
/// A processor may fail with any error; the worker contains the failure and
/// records the task as FAILED. Processors are resolved from the task's type
/// tag by the [`ProcessorRegistry`].
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// The task type tag this processor handles.
    fn task_type(&self) -> &str;

    /// Processes one claimed task.
    async fn process(&self, task: &Task) -> Result<(), ProcessorError>;
}

/// Registry mapping task type tags to processors.
///
/// Registration typically happens once at startup; lookups run on every
/// worker cycle. Registering a second processor for the same type replaces
/// the first.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<String, Arc<dyn TaskProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a processor under its own task type tag.
    pub fn register(&self, processor: Arc<dyn TaskProcessor>) {
        let task_type = processor.task_type().to_string();
        self.processors
            .write()
            .expect("processor registry lock poisoned")
            .insert(task_type, processor);
    }

    /// Resolves the processor for a task type, if one is registered.
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskProcessor>> {
        self.processors
            .read()
            .expect("processor registry lock poisoned")
            .get(task_type)
            .cloned()
    }

    /// The registered task types, in no particular order.
    pub fn registered_types(&self) -> Vec<String> {
        self.processors
            .read()
            .expect("processor registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
