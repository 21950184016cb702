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

//! Sequential pipeline executor with profiling and a three-outcome listener.

use super::step::{ComputationStep, StepTimings};
use crate::error::ExecutorError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Lifecycle callbacks of one pipeline execution.
///
/// Call order is fixed: `on_start`, then exactly one of
/// `on_success`/`on_error`, then `on_end`. The success/error callback is
/// where the caller records terminal task status; the executor itself is
/// persistence-agnostic.
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    async fn on_start(&self) {}

    async fn on_success(&self, timings: &StepTimings) {
        let _ = timings;
    }

    async fn on_error(&self, error: &ExecutorError, timings: &StepTimings) {
        let _ = (error, timings);
    }

    async fn on_end(&self) {}
}

/// Runs an ordered sequence of steps for a single claimed task.
///
/// Steps run in the caller-supplied order; the first failure aborts the
/// remaining steps. Each step's wall-clock duration is measured and
/// accumulated into a [`StepTimings`] profile.
pub struct StepExecutor {
    listener: Arc<dyn ExecutionListener>,
}

impl StepExecutor {
    /// Creates an executor reporting to the given listener.
    pub fn new(listener: Arc<dyn ExecutionListener>) -> Self {
        StepExecutor { listener }
    }

    /// Runs the pipeline.
    ///
    /// `on_end` is invoked exactly once, after the success/error callback,
    /// regardless of outcome.
    pub async fn execute(
        &self,
        steps: &[Arc<dyn ComputationStep>],
    ) -> Result<StepTimings, ExecutorError> {
        self.listener.on_start().await;

        let mut timings = StepTimings::default();
        let mut failure: Option<ExecutorError> = None;

        for step in steps {
            let started = Instant::now();
            let result = step.execute().await;
            let elapsed = started.elapsed();
            timings.record(step.description(), elapsed);
            debug!(
                step = step.description(),
                time_ms = elapsed.as_millis() as u64,
                failed = result.is_err(),
                "Step executed"
            );

            if let Err(source) = result {
                failure = Some(ExecutorError::StepFailed {
                    step: step.description().to_string(),
                    source,
                });
                break;
            }
        }

        let outcome = match failure {
            None => {
                self.listener.on_success(&timings).await;
                Ok(timings)
            }
            Some(error) => {
                self.listener.on_error(&error, &timings).await;
                Err(error)
            }
        };

        self.listener.on_end().await;
        outcome
    }
}
