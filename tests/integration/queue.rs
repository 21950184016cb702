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

//! Integration tests for the task queue: submission, claiming, pausing,
//! cancellation and terminal removal.

use crate::fixtures::fresh_database;
use async_trait::async_trait;
use grindstone::error::ListenerError;
use grindstone::{
    ActivityStatus, QueueEntryStatus, QueueError, QueueListener, Task, TaskFailure, TaskQueue,
    UniversalUuid,
};
use serial_test::serial;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

const WORKER_UUID_1: &str = "worker-uuid-1";
const WORKER_UUID_2: &str = "worker-uuid-2";

async fn submit_task(queue: &TaskQueue, task_type: &str, component: &str) -> Task {
    let mut submission = queue.prepare_submission();
    submission
        .set_type(task_type)
        .set_component_uuid(component)
        .set_submitter_login("ada");
    queue.submit(submission).await.expect("submit failed")
}

/// Submits tasks far enough apart that their millisecond timestamps differ,
/// making the claim order assertion deterministic.
async fn submit_spaced(queue: &TaskQueue, components: &[&str]) -> Vec<Task> {
    let mut tasks = Vec::new();
    for component in components {
        tasks.push(submit_task(queue, "report", component).await);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tasks
}

#[tokio::test]
#[serial]
async fn test_submit_creates_pending_entry_and_returns_task() {
    let queue = TaskQueue::new(fresh_database());

    let task = submit_task(&queue, "report", "proj-A").await;

    assert_eq!(task.task_type(), "report");
    assert_eq!(task.component_uuid(), Some("proj-A"));
    assert_eq!(task.submitter_login(), Some("ada"));

    let entry = queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .expect("entry should exist");
    assert_eq!(entry.status, QueueEntryStatus::Pending);
    assert!(entry.started_at.is_none());
    assert!(entry.worker_uuid.is_none());

    assert_eq!(queue.status().snapshot().received, 1);
}

#[tokio::test]
#[serial]
async fn test_submit_rejects_empty_task_type() {
    let queue = TaskQueue::new(fresh_database());

    let submission = queue.prepare_submission();
    let err = queue.submit(submission).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidSubmission { .. }));
    assert_eq!(queue.status().snapshot().received, 0);
}

#[tokio::test]
#[serial]
async fn test_submit_fails_while_paused_and_succeeds_after_resume() {
    let queue = TaskQueue::new(fresh_database());

    queue.pause_submit();
    assert!(queue.is_submit_paused());

    let mut submission = queue.prepare_submission();
    submission.set_type("report");
    let err = queue.submit(submission.clone()).await.unwrap_err();
    assert!(matches!(err, QueueError::SubmissionRejected));

    queue.resume_submit();
    assert!(!queue.is_submit_paused());
    queue.submit(submission).await.expect("submit after resume");
}

#[tokio::test]
#[serial]
async fn test_submit_all_queues_every_submission() {
    let queue = TaskQueue::new(fresh_database());

    let mut first = queue.prepare_submission();
    first.set_type("report").set_component_uuid("proj-A");
    let mut second = queue.prepare_submission();
    second.set_type("audit");

    let tasks = queue.submit_all(vec![first, second]).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(queue.status().snapshot().received, 2);

    let entries = queue.dal().queue_entry().select_all_ascending().await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
#[serial]
async fn test_submit_all_rejects_batch_with_invalid_submission() {
    let queue = TaskQueue::new(fresh_database());

    let mut valid = queue.prepare_submission();
    valid.set_type("report");
    let invalid = queue.prepare_submission();

    let err = queue.submit_all(vec![valid, invalid]).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidSubmission { .. }));

    // Nothing was queued: the batch is all-or-nothing.
    let entries = queue.dal().queue_entry().select_all_ascending().await.unwrap();
    assert!(entries.is_empty());
    assert_eq!(queue.status().snapshot().received, 0);
}

#[tokio::test]
#[serial]
async fn test_peek_claims_oldest_pending_first() {
    let queue = TaskQueue::new(fresh_database());
    let submitted = submit_spaced(&queue, &["proj-A", "proj-B", "proj-C"]).await;

    for expected in &submitted {
        let claimed = queue
            .peek(WORKER_UUID_1)
            .await
            .unwrap()
            .expect("a pending task should be claimable");
        assert_eq!(claimed.uuid(), expected.uuid());
    }

    // No more pending tasks.
    assert!(queue.peek(WORKER_UUID_2).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_peek_stamps_claim_onto_entry() {
    let queue = TaskQueue::new(fresh_database());
    let task = submit_task(&queue, "report", "proj-A").await;

    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();
    assert_eq!(claimed.uuid(), task.uuid());

    let entry = queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, QueueEntryStatus::InProgress);
    assert_eq!(entry.worker_uuid.as_deref(), Some(WORKER_UUID_1));
    assert!(entry.started_at.is_some());

    assert_eq!(queue.status().snapshot().in_progress, 1);
}

#[tokio::test]
#[serial]
async fn test_claimed_entry_is_invisible_to_second_peek() {
    let queue = TaskQueue::new(fresh_database());
    submit_task(&queue, "report", "proj-A").await;

    assert!(queue.peek(WORKER_UUID_1).await.unwrap().is_some());
    assert!(queue.peek(WORKER_UUID_2).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_peek_returns_none_while_paused() {
    let queue = TaskQueue::new(fresh_database());
    submit_task(&queue, "report", "proj-A").await;

    queue.pause_peek();
    assert!(queue.peek(WORKER_UUID_1).await.unwrap().is_none());

    queue.resume_peek();
    assert!(queue.peek(WORKER_UUID_1).await.unwrap().is_some());
}

#[tokio::test]
#[serial]
async fn test_pause_switches_are_independent() {
    let queue = TaskQueue::new(fresh_database());

    queue.pause_peek();
    // Submission still works while peeking is paused.
    submit_task(&queue, "report", "proj-A").await;

    queue.pause_submit();
    queue.resume_peek();
    // Claiming still works while submission is paused.
    assert!(queue.peek(WORKER_UUID_1).await.unwrap().is_some());
}

/// The central correctness property: concurrent peeks against a single
/// pending entry produce exactly one claim.
#[tokio::test]
#[serial]
async fn test_concurrent_peek_claims_at_most_once() {
    let queue = Arc::new(TaskQueue::new(fresh_database()));
    let task = submit_task(&queue, "report", "proj-A").await;

    const NUM_WORKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_WORKERS));
    let mut handles = Vec::new();

    for worker_id in 0..NUM_WORKERS {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            queue
                .peek(&format!("concurrent-worker-{}", worker_id))
                .await
                .expect("peek should not fail")
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(task) = handle.await.expect("worker task panicked") {
            claimed.push(task.uuid());
        }
    }

    assert_eq!(
        claimed.len(),
        1,
        "exactly one worker must claim the entry, got {:?}",
        claimed
    );
    assert_eq!(claimed[0], task.uuid());

    let unique: HashSet<_> = claimed.iter().collect();
    assert_eq!(unique.len(), claimed.len());
}

#[tokio::test]
#[serial]
async fn test_cancel_pending_records_canceled_activity() {
    let queue = TaskQueue::new(fresh_database());
    let task = submit_task(&queue, "report", "proj-A").await;

    assert!(queue.cancel(task.uuid()).await.unwrap());

    // Queue entry is gone; history holds the CANCELED record.
    assert!(queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .is_none());
    let activity = queue
        .dal()
        .activity()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(activity.status, ActivityStatus::Canceled);
    assert!(activity.execution_time_ms.is_none());
}

#[tokio::test]
#[serial]
async fn test_cancel_in_progress_fails_and_leaves_entry_untouched() {
    let queue = TaskQueue::new(fresh_database());
    let task = submit_task(&queue, "report", "proj-A").await;
    queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let err = queue.cancel(task.uuid()).await.unwrap_err();
    assert!(matches!(err, QueueError::TaskInProgress { .. }));

    let entry = queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, QueueEntryStatus::InProgress);
}

#[tokio::test]
#[serial]
async fn test_cancel_unknown_uuid_returns_false() {
    let queue = TaskQueue::new(fresh_database());
    assert!(!queue.cancel(UniversalUuid::new_v4()).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_cancel_all_spares_in_progress_by_default() {
    let queue = TaskQueue::new(fresh_database());
    let submitted = submit_spaced(&queue, &["proj-A", "proj-B", "proj-C"]).await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let canceled = queue.cancel_all(false).await.unwrap();
    assert_eq!(canceled, 2);

    // The claimed entry survives; the other two are in the history.
    let remaining = queue.dal().queue_entry().select_all_ascending().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].uuid, claimed.uuid());
    assert_eq!(
        queue
            .dal()
            .activity()
            .count_by_status(ActivityStatus::Canceled)
            .await
            .unwrap(),
        2
    );
    assert_eq!(submitted.len(), 3);
}

#[tokio::test]
#[serial]
async fn test_cancel_all_can_include_in_progress() {
    let queue = TaskQueue::new(fresh_database());
    submit_spaced(&queue, &["proj-A", "proj-B"]).await;
    queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let canceled = queue.cancel_all(true).await.unwrap();
    assert_eq!(canceled, 2);
    assert!(queue
        .dal()
        .queue_entry()
        .select_all_ascending()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[serial]
async fn test_remove_is_terminal_and_atomic() {
    let queue = TaskQueue::new(fresh_database());
    let task = submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let activity = queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap();

    assert_eq!(activity.status, ActivityStatus::Success);
    assert_eq!(activity.uuid, task.uuid());
    let started = activity.started_at.expect("claimed task has a start time");
    assert!(activity.finished_at >= started);
    assert_eq!(
        activity.execution_time_ms,
        Some(activity.finished_at.millis_since(started))
    );

    // Queue is empty, history has exactly the one record.
    assert!(queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        queue
            .dal()
            .activity()
            .count_by_status(ActivityStatus::Success)
            .await
            .unwrap(),
        1
    );

    let snapshot = queue.status().snapshot();
    assert_eq!(snapshot.success, 1);
    assert_eq!(snapshot.in_progress, 0);
}

#[tokio::test]
#[serial]
async fn test_remove_twice_fails_with_task_not_found() {
    let queue = TaskQueue::new(fresh_database());
    submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap();
    let err = queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::TaskNotFound { .. }));
}

#[tokio::test]
#[serial]
async fn test_remove_failed_records_error_data() {
    let queue = TaskQueue::new(fresh_database());
    submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let failure = TaskFailure {
        message: "report extraction failed".to_string(),
        details: Some("{\"causes\":[\"disk full\"]}".to_string()),
    };
    let activity = queue
        .remove(&claimed, ActivityStatus::Failed, Some(failure))
        .await
        .unwrap();

    assert_eq!(activity.status, ActivityStatus::Failed);
    assert_eq!(
        activity.error_message.as_deref(),
        Some("report extraction failed")
    );
    assert!(activity.error_details.is_some());
    assert_eq!(queue.status().snapshot().error, 1);
}

#[tokio::test]
#[serial]
async fn test_remove_rejects_error_data_with_success_status() {
    let queue = TaskQueue::new(fresh_database());
    submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let failure = TaskFailure {
        message: "should not be accepted".to_string(),
        details: None,
    };
    let err = queue
        .remove(&claimed, ActivityStatus::Success, Some(failure))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidArgument { .. }));

    // The entry is untouched.
    assert!(queue
        .dal()
        .queue_entry()
        .find_by_uuid(claimed.uuid())
        .await
        .unwrap()
        .is_some());
}

struct JournalListener {
    name: &'static str,
    journal: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl QueueListener for JournalListener {
    async fn on_removed(&self, task: &Task, status: ActivityStatus) -> Result<(), ListenerError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", self.name, task.uuid(), status));
        Ok(())
    }
}

struct FailingListener;

#[async_trait]
impl QueueListener for FailingListener {
    async fn on_removed(&self, _task: &Task, _status: ActivityStatus) -> Result<(), ListenerError> {
        Err("listener exploded".into())
    }
}

#[tokio::test]
#[serial]
async fn test_listeners_run_in_registration_order() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let queue = TaskQueue::with_listeners(
        fresh_database(),
        vec![
            Arc::new(JournalListener {
                name: "first",
                journal: Arc::clone(&journal),
            }),
            Arc::new(JournalListener {
                name: "second",
                journal: Arc::clone(&journal),
            }),
        ],
    );

    let task = submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();
    queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap();

    let journal = journal.lock().unwrap();
    assert_eq!(
        *journal,
        vec![
            format!("first:{}:SUCCESS", task.uuid()),
            format!("second:{}:SUCCESS", task.uuid()),
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_failing_listener_propagates_and_aborts_later_listeners() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let queue = TaskQueue::with_listeners(
        fresh_database(),
        vec![
            Arc::new(FailingListener),
            Arc::new(JournalListener {
                name: "never",
                journal: Arc::clone(&journal),
            }),
        ],
    );

    let task = submit_task(&queue, "report", "proj-A").await;
    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    let err = queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Listener(_)));
    assert!(journal.lock().unwrap().is_empty());

    // The terminal transaction committed before listeners ran.
    assert!(queue
        .dal()
        .activity()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
#[serial]
async fn test_recover_stalled_returns_abandoned_claims_to_pending() {
    let queue = TaskQueue::new(fresh_database());
    let task = submit_task(&queue, "report", "proj-A").await;
    queue.peek(WORKER_UUID_1).await.unwrap().unwrap();

    // A generous deadline leaves the fresh claim alone.
    assert_eq!(
        queue.recover_stalled(Duration::from_secs(3600)).await.unwrap(),
        0
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    let recovered = queue
        .recover_stalled(Duration::from_millis(1))
        .await
        .unwrap();
    assert_eq!(recovered, 1);

    let entry = queue
        .dal()
        .queue_entry()
        .find_by_uuid(task.uuid())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, QueueEntryStatus::Pending);
    assert!(entry.worker_uuid.is_none());
    assert!(entry.started_at.is_none());

    // The recovered entry is claimable again.
    assert!(queue.peek(WORKER_UUID_2).await.unwrap().is_some());
}

#[tokio::test]
#[serial]
async fn test_end_to_end_submit_peek_remove() {
    let queue = TaskQueue::new(fresh_database());

    let task = submit_task(&queue, "report", "proj-A").await;
    assert_eq!(
        queue
            .dal()
            .queue_entry()
            .count_by_status(QueueEntryStatus::Pending)
            .await
            .unwrap(),
        1
    );

    let claimed = queue.peek(WORKER_UUID_1).await.unwrap().unwrap();
    assert_eq!(claimed.uuid(), task.uuid());

    queue
        .remove(&claimed, ActivityStatus::Success, None)
        .await
        .unwrap();
    assert!(queue
        .dal()
        .queue_entry()
        .select_all_ascending()
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        queue
            .dal()
            .activity()
            .count_by_status(ActivityStatus::Success)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
#[serial]
async fn test_end_to_end_pause_submit_mid_stream() {
    let queue = TaskQueue::new(fresh_database());

    let t1 = submit_task(&queue, "report", "proj-A").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let t2 = submit_task(&queue, "report", "proj-B").await;

    queue.pause_submit();
    let mut rejected = queue.prepare_submission();
    rejected.set_type("report");
    assert!(matches!(
        queue.submit(rejected).await.unwrap_err(),
        QueueError::SubmissionRejected
    ));

    assert_eq!(
        queue.peek(WORKER_UUID_1).await.unwrap().unwrap().uuid(),
        t1.uuid()
    );
    assert_eq!(
        queue.peek(WORKER_UUID_1).await.unwrap().unwrap().uuid(),
        t2.uuid()
    );
    // The rejected submission was never queued.
    assert!(queue.peek(WORKER_UUID_1).await.unwrap().is_none());
}
