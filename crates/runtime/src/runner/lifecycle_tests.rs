// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::intake::IntakeItem;
use crate::runner::{RunnerDeps, TaskRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use taskd_core::{ChainTask, FakeClock, TaskEvent, TaskId, TaskState, TaskStatus};
use taskd_ports::{
    ContractCall, EventQueue, FakeContractClient, FakeEventQueue, FakeRelayClient, FakeStateCache,
    FakeWatcher, FakeWorker, RelayError, StateCache, TaskArgs, Worker, WorkerError, WorkerOutcome,
};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

fn chain_task(task_id: TaskId, timeout: u64) -> ChainTask {
    ChainTask {
        id: task_id,
        timeout,
        selected_nodes: vec!["0xself".to_string()],
        commitments: vec![],
        result_node: None,
        aborted: false,
    }
}

struct Fixture {
    cache: Arc<FakeStateCache>,
    contract: Arc<FakeContractClient>,
    relay: Arc<FakeRelayClient>,
    watcher: Arc<FakeWatcher>,
    queue: Arc<FakeEventQueue>,
    worker: Arc<dyn Worker>,
}

impl Fixture {
    fn new(worker: Arc<dyn Worker>) -> Self {
        Self {
            cache: Arc::new(FakeStateCache::new()),
            contract: Arc::new(FakeContractClient::new()),
            relay: Arc::new(FakeRelayClient::new()),
            watcher: Arc::new(FakeWatcher::new()),
            queue: Arc::new(FakeEventQueue::new()),
            worker,
        }
    }

    fn deps(&self, task_id: TaskId) -> RunnerDeps {
        RunnerDeps {
            cache: self.cache.clone(),
            contract: self.contract.clone(),
            relay: self.relay.clone(),
            worker: self.worker.clone(),
            watcher: self.watcher.clone(),
            event_queue: self.queue.clone(),
            account: "0xself".to_string(),
            artifacts_root: std::env::temp_dir()
                .join("taskd-lifecycle-tests")
                .join(task_id.get().to_string()),
        }
    }
}

#[tokio::test]
async fn init_creates_a_fresh_record_for_an_unseen_task() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(1);
    fixture.contract.seed_task(chain_task(task_id, 9_000));
    let (runner, _tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));

    let skip = runner.init().await.unwrap();

    assert!(!skip);
    assert_eq!(runner.status(), TaskStatus::Pending);
    assert_eq!(runner.state().timeout, 9_000);
    assert!(fixture.cache.peek(task_id).is_some());
}

#[tokio::test]
async fn init_loads_existing_state_and_refreshes_timeout_from_chain() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(2);
    let mut existing = TaskState::new(task_id);
    existing.status = TaskStatus::Executing;
    existing.round = 3;
    existing.timeout = 1;
    fixture.cache.dump(&existing).await.unwrap();
    fixture.contract.seed_task(chain_task(task_id, 5_555));

    let (runner, _tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    let skip = runner.init().await.unwrap();

    assert!(!skip);
    assert_eq!(runner.state().round, 3);
    assert_eq!(runner.state().timeout, 5_555);
}

#[tokio::test]
async fn init_skips_when_status_is_already_terminal() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(3);
    let mut existing = TaskState::new(task_id);
    existing.status = TaskStatus::Success;
    existing.round = 1;
    existing.result = vec![1, 2, 3];
    fixture.cache.dump(&existing).await.unwrap();

    let (runner, _tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    let skip = runner.init().await.unwrap();

    assert!(skip);
    assert_eq!(runner.status(), TaskStatus::Success);
    // No chain lookup should have been necessary to recognize terminal state.
    assert!(fixture.contract.calls().is_empty());
}

#[tokio::test]
async fn init_aborts_when_the_task_does_not_exist_on_chain() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(4);
    // Contract has no seeded task for id 4.
    let (runner, _tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));

    let skip = runner.init().await.unwrap();

    assert!(skip);
    assert_eq!(runner.status(), TaskStatus::Aborted);
}

#[tokio::test]
async fn s1_happy_path_selected_uploader_reaches_success_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    tokio::fs::write(&a, b"alpha").await.unwrap();
    tokio::fs::write(&b, b"beta").await.unwrap();

    let fixture = Fixture::new(Arc::new(FakeWorker::producing(vec![a.clone(), b.clone()])));
    let task_id = TaskId::new(7);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));
    fixture.relay.seed_task(TaskArgs {
        task_id,
        payload: serde_json::json!({}),
    });

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));

    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskCreated { task_id, round: 2 },
        })
        .unwrap();
    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskResultCommitmentsReady { task_id },
        })
        .unwrap();
    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskSuccess {
                task_id,
                result_node: "0xself".to_string(),
            },
        })
        .unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), runner.start())
        .await
        .expect("runner did not finish in time");

    assert_eq!(status, TaskStatus::Success);
    assert_eq!(
        fixture
            .contract
            .call_count(|c| matches!(c, ContractCall::SubmitTaskResultCommitment { .. })),
        1
    );
    assert_eq!(
        fixture
            .contract
            .call_count(|c| matches!(c, ContractCall::ReportResultsUploaded { .. })),
        1
    );
    assert_eq!(fixture.watcher.active_watches().len(), 0);
    assert_eq!(fixture.watcher.unwatched_count(), 3);
    // Artifact directory was removed by cleanup.
    assert!(!a.exists());
}

#[tokio::test]
async fn s2_happy_path_not_uploader_skips_relay_upload() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    tokio::fs::write(&a, b"alpha").await.unwrap();

    let fixture = Fixture::new(Arc::new(FakeWorker::producing(vec![a.clone()])));
    let task_id = TaskId::new(8);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));
    fixture.relay.seed_task(TaskArgs {
        task_id,
        payload: serde_json::json!({}),
    });

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    for event in [
        TaskEvent::TaskCreated { task_id, round: 1 },
        TaskEvent::TaskResultCommitmentsReady { task_id },
        TaskEvent::TaskSuccess {
            task_id,
            result_node: "0xother".to_string(),
        },
    ] {
        intake_tx.send(IntakeItem { ack_id: None, event }).unwrap();
    }

    let status = tokio::time::timeout(Duration::from_secs(5), runner.start())
        .await
        .expect("runner did not finish in time");

    assert_eq!(status, TaskStatus::Success);
    assert!(fixture.relay.calls().iter().all(|c| !matches!(c, taskd_ports::RelayCall::Upload { .. })));
    assert_eq!(
        fixture
            .contract
            .call_count(|c| matches!(c, ContractCall::ReportResultsUploaded { .. })),
        0
    );
}

#[tokio::test]
async fn s3_peer_abort_reports_task_error() {
    let fixture = Fixture::new(Arc::new(FakeWorker::producing(vec![])));
    let task_id = TaskId::new(9);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));
    fixture.contract.script_revert(
        taskd_core::ContractMethod::SubmitTaskResultCommitment,
        "execution reverted: Task is aborted",
    );
    fixture.relay.seed_task(TaskArgs {
        task_id,
        payload: serde_json::json!({}),
    });

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskCreated { task_id, round: 5 },
        })
        .unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), runner.start())
        .await
        .expect("runner did not finish in time");

    assert_eq!(status, TaskStatus::Aborted);
    assert_eq!(
        fixture
            .contract
            .call_count(|c| matches!(c, ContractCall::ReportTaskError { .. })),
        1
    );
}

struct SlowWorker;

#[async_trait]
impl Worker for SlowWorker {
    async fn run(
        &self,
        _task_id: TaskId,
        _args: &TaskArgs,
        _output_dir: &Path,
        _cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(WorkerOutcome::Produced(Vec::<PathBuf>::new()))
    }
}

#[tokio::test(start_paused = true)]
async fn s4_deadline_aborts_and_cancels_task_exactly_once() {
    let fixture = Fixture::new(Arc::new(SlowWorker));
    let task_id = TaskId::new(10);
    fixture.contract.seed_task(chain_task(task_id, 1));
    fixture.relay.seed_task(TaskArgs {
        task_id,
        payload: serde_json::json!({}),
    });

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskCreated { task_id, round: 1 },
        })
        .unwrap();

    let handle = tokio::spawn(runner.start());
    tokio::time::advance(Duration::from_secs(2)).await;
    let status = handle.await.unwrap();

    assert_eq!(status, TaskStatus::Aborted);
    assert_eq!(
        fixture.contract.call_count(|c| matches!(c, ContractCall::CancelTask { .. })),
        1
    );
}

#[tokio::test]
async fn s6_invalid_task_reports_error_and_aborts() {
    let fixture = Fixture::new(Arc::new(FakeWorker::failing(WorkerError::TaskInvalid(
        "task invalid".to_string(),
    ))));
    let task_id = TaskId::new(11);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));
    fixture.relay.seed_task(TaskArgs {
        task_id,
        payload: serde_json::json!({}),
    });

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    intake_tx
        .send(IntakeItem {
            ack_id: None,
            event: TaskEvent::TaskCreated { task_id, round: 1 },
        })
        .unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), runner.start())
        .await
        .expect("runner did not finish in time");

    assert_eq!(status, TaskStatus::Aborted);
    assert_eq!(
        fixture
            .contract
            .call_count(|c| matches!(c, ContractCall::ReportTaskError { .. })),
        1
    );
}

#[tokio::test]
async fn drain_acks_every_buffered_event_on_terminal_exit() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(12);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));

    // Pre-seed real queue deliveries so ack/no-ack is observable.
    fixture.queue.put(TaskEvent::TaskAborted { task_id }).await.unwrap();
    let (ack_id, event) = fixture.queue.recv().await.unwrap();
    intake_tx.send(IntakeItem { ack_id: Some(ack_id), event }).unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), runner.start())
        .await
        .expect("runner did not finish in time");

    assert_eq!(status, TaskStatus::Aborted);
    assert!(fixture.queue.outstanding_acks().is_empty());
}

#[tokio::test]
async fn drain_no_acks_a_failed_delivery_even_on_terminal_exit() {
    // A delivery whose handler already propagated an error (tracked in
    // `failed`) must always be returned for redelivery, even if the task
    // happens to reach a terminal status via some other event before
    // `drain` runs.
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(14);
    let (runner, _intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));

    fixture
        .queue
        .put(TaskEvent::TaskResultCommitmentsReady { task_id })
        .await
        .unwrap();
    let (ack_id, event) = fixture.queue.recv().await.unwrap();
    runner.outstanding.lock().insert(ack_id, event);
    runner.failed.lock().insert(ack_id);

    runner.drain(TaskStatus::Success).await;

    assert!(fixture.queue.outstanding_acks().is_empty());
    assert_eq!(fixture.queue.pending_len(), 1);
}

#[tokio::test]
async fn drain_no_acks_every_buffered_event_on_nonterminal_exit() {
    let fixture = Fixture::new(Arc::new(FakeWorker::dispatching()));
    let task_id = TaskId::new(13);
    fixture.contract.seed_task(chain_task(task_id, 4_000_000_000));
    // Relay never answers, so TaskCreated handling blocks in its retry loop
    // and the task never reaches a terminal status before the sender drops.
    fixture.relay.queue_errors(
        task_id,
        vec![RelayError::NotReady("staging".to_string()); 1],
    );

    let (runner, intake_tx) = TaskRunner::new(task_id, fixture.deps(task_id), FakeClock::new(0));
    fixture.queue.put(TaskEvent::TaskCreated { task_id, round: 1 }).await.unwrap();
    let (ack_id, event) = fixture.queue.recv().await.unwrap();
    intake_tx.send(IntakeItem { ack_id: Some(ack_id), event }).unwrap();

    let runner_for_task = runner.clone();
    let handle = tokio::spawn(async move { runner_for_task.start().await });

    // Give the handler a moment to register as outstanding, then drop the
    // sender to simulate the dispatcher tearing this runner down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(intake_tx);

    let status = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("runner did not finish in time")
        .unwrap();

    assert!(!status.is_terminal());
}
