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

//! End-to-end tests wiring the step executor into a task processor: a
//! claimed task runs its step pipeline and the pipeline outcome becomes the
//! task's terminal status.

use crate::fixtures::fresh_database;
use async_trait::async_trait;
use grindstone::error::{ProcessorError, StepError};
use grindstone::{
    ActivityStatus, ComputationStep, ExecutionListener, ProcessorRegistry, StepExecutor, Task,
    TaskProcessor, TaskQueue, Worker,
};
use serial_test::serial;
use std::sync::{Arc, Mutex};

struct JournalStep {
    description: String,
    journal: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl ComputationStep for JournalStep {
    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self) -> Result<(), StepError> {
        self.journal.lock().unwrap().push(self.description.clone());
        if self.fail {
            Err("index unavailable".into())
        } else {
            Ok(())
        }
    }
}

struct NoopListener;

#[async_trait]
impl ExecutionListener for NoopListener {}

/// Processor that drives a fixed step pipeline through the step executor.
struct PipelineProcessor {
    steps: Vec<Arc<dyn ComputationStep>>,
}

#[async_trait]
impl TaskProcessor for PipelineProcessor {
    fn task_type(&self) -> &str {
        "report"
    }

    async fn process(&self, _task: &Task) -> Result<(), ProcessorError> {
        let executor = StepExecutor::new(Arc::new(NoopListener));
        executor.execute(&self.steps).await?;
        Ok(())
    }
}

fn pipeline_worker(
    queue: &Arc<TaskQueue>,
    steps: Vec<Arc<dyn ComputationStep>>,
) -> Worker {
    let registry = Arc::new(ProcessorRegistry::new());
    registry.register(Arc::new(PipelineProcessor { steps }));
    Worker::new(Arc::clone(queue), registry)
}

async fn submit(queue: &TaskQueue) -> Task {
    let mut submission = queue.prepare_submission();
    submission.set_type("report").set_component_uuid("proj-A");
    queue.submit(submission).await.expect("submit failed")
}

#[tokio::test]
#[serial]
async fn test_pipeline_success_completes_the_task() {
    let queue = Arc::new(TaskQueue::new(fresh_database()));
    let journal = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Arc<dyn ComputationStep>> = vec![
        Arc::new(JournalStep {
            description: "extract report".to_string(),
            journal: Arc::clone(&journal),
            fail: false,
        }),
        Arc::new(JournalStep {
            description: "persist issues".to_string(),
            journal: Arc::clone(&journal),
            fail: false,
        }),
        Arc::new(JournalStep {
            description: "compute measures".to_string(),
            journal: Arc::clone(&journal),
            fail: false,
        }),
    ];
    let worker = pipeline_worker(&queue, steps);

    let task = submit(&queue).await;
    assert!(worker.find_and_process_task().await.unwrap());

    assert_eq!(
        *journal.lock().unwrap(),
        vec!["extract report", "persist issues", "compute measures"]
    );
    let activity = queue
        .dal()
        .activity()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(activity.status, ActivityStatus::Success);
}

#[tokio::test]
#[serial]
async fn test_failing_step_fails_the_task_and_skips_the_rest() {
    let queue = Arc::new(TaskQueue::new(fresh_database()));
    let journal = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Arc<dyn ComputationStep>> = vec![
        Arc::new(JournalStep {
            description: "extract report".to_string(),
            journal: Arc::clone(&journal),
            fail: false,
        }),
        Arc::new(JournalStep {
            description: "persist issues".to_string(),
            journal: Arc::clone(&journal),
            fail: true,
        }),
        Arc::new(JournalStep {
            description: "compute measures".to_string(),
            journal: Arc::clone(&journal),
            fail: false,
        }),
    ];
    let worker = pipeline_worker(&queue, steps);

    let task = submit(&queue).await;
    assert!(worker.find_and_process_task().await.unwrap());

    // The step after the failure never ran.
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["extract report", "persist issues"]
    );
    let activity = queue
        .dal()
        .activity()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(activity.status, ActivityStatus::Failed);
    let message = activity.error_message.unwrap();
    assert!(message.contains("persist issues"), "got: {}", message);
    // The step's own error survives in the detail chain.
    assert!(activity.error_details.unwrap().contains("index unavailable"));
}
