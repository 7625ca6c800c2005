// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runner::{RunnerDeps, TaskRunner};
use std::sync::Arc;
use taskd_core::{ContractMethod, FakeClock, PendingTx, TaskId, TxHash};
use taskd_ports::{
    ContractCall, FakeContractClient, FakeEventQueue, FakeRelayClient, FakeStateCache, FakeWatcher, FakeWorker,
};

fn deps(contract: Arc<FakeContractClient>) -> RunnerDeps {
    RunnerDeps {
        cache: Arc::new(FakeStateCache::new()),
        contract,
        relay: Arc::new(FakeRelayClient::new()),
        worker: Arc::new(FakeWorker::producing(vec![])),
        watcher: Arc::new(FakeWatcher::new()),
        event_queue: Arc::new(FakeEventQueue::new()),
        account: "0xself".to_string(),
        artifacts_root: std::env::temp_dir(),
    }
}

#[tokio::test]
async fn fresh_submission_persists_pending_tx_then_clears_it_on_receipt() {
    let contract = Arc::new(FakeContractClient::new());
    let (runner, _tx) = TaskRunner::new(TaskId::new(1), deps(contract.clone()), FakeClock::new(0));

    let c = contract.clone();
    runner
        .run_coordinated(ContractMethod::SubmitTaskResultCommitment, move || {
            let c = c.clone();
            Box::pin(async move { c.submit_task_result_commitment(TaskId::new(1), 1, "0xaa").await })
        })
        .await
        .unwrap();

    assert_eq!(runner.state().waiting_tx, None);
    assert_eq!(
        contract.call_count(|c| matches!(c, ContractCall::SubmitTaskResultCommitment { .. })),
        1
    );
}

#[tokio::test]
async fn resumes_instead_of_resubmitting_when_pending_tx_matches() {
    let contract = Arc::new(FakeContractClient::new());
    let (runner, _tx) = TaskRunner::new(TaskId::new(1), deps(contract.clone()), FakeClock::new(0));

    runner
        .state_context(|s| {
            s.waiting_tx = Some(PendingTx {
                method: ContractMethod::DiscloseTaskResult,
                tx_hash: TxHash([7u8; 32]),
            });
        })
        .await
        .unwrap();

    let c = contract.clone();
    runner
        .run_coordinated(ContractMethod::DiscloseTaskResult, move || {
            let c = c.clone();
            Box::pin(async move { c.disclose_task_result(TaskId::new(1), 1, b"result").await })
        })
        .await
        .unwrap();

    assert_eq!(
        contract.call_count(|c| matches!(c, ContractCall::DiscloseTaskResult { .. })),
        0
    );
    assert_eq!(contract.call_count(|c| matches!(c, ContractCall::Resume { .. })), 1);
    assert_eq!(runner.state().waiting_tx, None);
}

#[tokio::test]
async fn mismatched_pending_method_is_an_error_and_does_not_touch_the_chain() {
    let contract = Arc::new(FakeContractClient::new());
    let (runner, _tx) = TaskRunner::new(TaskId::new(1), deps(contract.clone()), FakeClock::new(0));

    runner
        .state_context(|s| {
            s.waiting_tx = Some(PendingTx {
                method: ContractMethod::SubmitTaskResultCommitment,
                tx_hash: TxHash([1u8; 32]),
            });
        })
        .await
        .unwrap();

    let c = contract.clone();
    let err = runner
        .run_coordinated(ContractMethod::DiscloseTaskResult, move || {
            let c = c.clone();
            Box::pin(async move { c.disclose_task_result(TaskId::new(1), 1, b"result").await })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::InconsistentPendingTx { .. }));
    assert!(contract.calls().is_empty());
}

#[tokio::test]
async fn reverted_receipt_clears_pending_tx_and_propagates_the_error() {
    let contract = Arc::new(FakeContractClient::new());
    contract.script_revert(ContractMethod::SubmitTaskResultCommitment, "insufficient stake");
    let (runner, _tx) = TaskRunner::new(TaskId::new(1), deps(contract.clone()), FakeClock::new(0));

    let c = contract.clone();
    let err = runner
        .run_coordinated(ContractMethod::SubmitTaskResultCommitment, move || {
            let c = c.clone();
            Box::pin(async move { c.submit_task_result_commitment(TaskId::new(1), 1, "0xaa").await })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::RevertOther(_)));
    assert_eq!(runner.state().waiting_tx, None);
}

#[tokio::test]
async fn reverted_with_known_reason_is_classified_as_revert_known() {
    let contract = Arc::new(FakeContractClient::new());
    contract.script_revert(ContractMethod::SubmitTaskResultCommitment, "Task is aborted");
    let (runner, _tx) = TaskRunner::new(TaskId::new(1), deps(contract.clone()), FakeClock::new(0));

    let c = contract.clone();
    let err = runner
        .run_coordinated(ContractMethod::SubmitTaskResultCommitment, move || {
            let c = c.clone();
            Box::pin(async move { c.submit_task_result_commitment(TaskId::new(1), 1, "0xaa").await })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::RevertKnown(_)));
    assert_eq!(runner.state().waiting_tx, None);
}
