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

//! Computation steps and their timing profile.

use crate::error::StepError;
use async_trait::async_trait;
use std::time::Duration;

/// One stage of a task-specific processing pipeline.
///
/// Steps are side-effecting and run sequentially in the order the caller
/// supplies them; the executor performs no reordering, retry or skip logic.
/// Any error aborts the remaining steps of the pipeline.
#[async_trait]
pub trait ComputationStep: Send + Sync {
    /// Short human-readable description, used in logs and profiling.
    fn description(&self) -> &str;

    /// Runs the step.
    async fn execute(&self) -> Result<(), StepError>;
}

/// Wall-clock duration of one executed step.
#[derive(Debug, Clone)]
pub struct StepTiming {
    /// The step's description
    pub description: String,
    /// How long the step ran
    pub duration: Duration,
}

/// Accumulated timing profile of a pipeline run.
///
/// On failure the profile covers the steps that ran, including the failing
/// one; steps that never ran do not appear.
#[derive(Debug, Clone, Default)]
pub struct StepTimings {
    steps: Vec<StepTiming>,
    total: Duration,
}

impl StepTimings {
    /// Cumulative duration across all executed steps.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Per-step durations in execution order.
    pub fn steps(&self) -> &[StepTiming] {
        &self.steps
    }

    /// Number of steps that ran.
    pub fn executed_count(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn record(&mut self, description: &str, duration: Duration) {
        self.total += duration;
        self.steps.push(StepTiming {
            description: description.to_string(),
            duration,
        });
    }
}
