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

//! Step Executor Module
//!
//! Runs the ordered step pipeline of one claimed task: each step in caller
//! order, wall-clock timed, aborting on the first failure. The executor is
//! persistence-agnostic; terminal task status is the listener's concern.

pub mod step;
pub mod step_executor;

pub use step::{ComputationStep, StepTiming, StepTimings};
pub use step_executor::{ExecutionListener, StepExecutor};
