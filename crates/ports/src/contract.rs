// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction submission and receipt waiting against the task contract.

use async_trait::async_trait;
use taskd_core::{ChainTask, ContractMethod, TaskId, TxHash};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// Connection drop, nonce race, and similar: the caller should
    /// propagate this out of the handler so the event is redelivered.
    #[error("transient chain error: {0}")]
    Transient(String),
    /// The transaction was mined but reverted, carrying the contract's
    /// revert reason string.
    #[error("reverted: {0}")]
    Reverted(String),
    #[error("task {0} not found on chain")]
    TaskNotFound(TaskId),
}

/// Awaits the receipt of a submitted transaction.
#[async_trait]
pub trait TxWaiter: Send + Sync {
    async fn wait(self: Box<Self>) -> Result<(), ContractError>;
}

/// Submits task-contract transactions and reads on-chain task state.
///
/// Every submit method returns the transaction's hash alongside a waiter;
/// the hash must be persisted before the waiter is awaited so a crash
/// mid-wait can resume via `resume` instead of resubmitting.
#[async_trait]
pub trait ContractClient: Send + Sync + 'static {
    async fn submit_task_result_commitment(
        &self,
        task_id: TaskId,
        round: u32,
        commitment: &str,
    ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError>;

    async fn disclose_task_result(
        &self,
        task_id: TaskId,
        round: u32,
        result: &[u8],
    ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError>;

    async fn report_results_uploaded(
        &self,
        task_id: TaskId,
        round: u32,
    ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError>;

    async fn report_task_error(
        &self,
        task_id: TaskId,
        round: u32,
    ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError>;

    async fn cancel_task(&self, task_id: TaskId) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError>;

    async fn get_task(&self, task_id: TaskId) -> Result<ChainTask, ContractError>;

    /// Rebuilds a waiter for an in-flight transaction from its persisted
    /// hash, without resubmitting the call.
    async fn resume(
        &self,
        method: ContractMethod,
        tx_hash: TxHash,
    ) -> Result<Box<dyn TxWaiter>, ContractError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ContractCall {
        SubmitTaskResultCommitment { task_id: TaskId, round: u32, commitment: String },
        DiscloseTaskResult { task_id: TaskId, round: u32, result: Vec<u8> },
        ReportResultsUploaded { task_id: TaskId, round: u32 },
        ReportTaskError { task_id: TaskId, round: u32 },
        CancelTask { task_id: TaskId },
        Resume { method: ContractMethod, tx_hash: TxHash },
    }

    #[derive(Default)]
    struct FakeContractState {
        calls: Vec<ContractCall>,
        tasks: HashMap<TaskId, ChainTask>,
        next_hash: u64,
        /// Revert reason to return for the next submission of this method.
        scripted_reverts: HashMap<ContractMethod, String>,
    }

    /// In-memory `ContractClient` for tests. Every submit returns an
    /// already-resolved `FakeTxWaiter` unless a revert has been scripted
    /// for that method via `script_revert`.
    #[derive(Clone, Default)]
    pub struct FakeContractClient {
        state: Arc<Mutex<FakeContractState>>,
    }

    impl FakeContractClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_task(&self, task: ChainTask) {
            self.state.lock().tasks.insert(task.id, task);
        }

        pub fn script_revert(&self, method: ContractMethod, reason: impl Into<String>) {
            self.state.lock().scripted_reverts.insert(method, reason.into());
        }

        pub fn calls(&self) -> Vec<ContractCall> {
            self.state.lock().calls.clone()
        }

        pub fn call_count(&self, matches: impl Fn(&ContractCall) -> bool) -> usize {
            self.state.lock().calls.iter().filter(|c| matches(c)).count()
        }

        fn submit(
            &self,
            method: ContractMethod,
            call: ContractCall,
        ) -> (TxHash, Box<dyn TxWaiter>) {
            let mut state = self.state.lock();
            state.calls.push(call);
            state.next_hash += 1;
            let mut bytes = [0u8; 32];
            bytes[24..].copy_from_slice(&state.next_hash.to_be_bytes());
            let tx_hash = TxHash(bytes);
            let revert = state.scripted_reverts.remove(&method);
            (tx_hash, Box::new(FakeTxWaiter { revert }))
        }
    }

    pub struct FakeTxWaiter {
        revert: Option<String>,
    }

    #[async_trait]
    impl TxWaiter for FakeTxWaiter {
        async fn wait(self: Box<Self>) -> Result<(), ContractError> {
            match self.revert {
                Some(reason) => Err(ContractError::Reverted(reason)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ContractClient for FakeContractClient {
        async fn submit_task_result_commitment(
            &self,
            task_id: TaskId,
            round: u32,
            commitment: &str,
        ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError> {
            Ok(self.submit(
                ContractMethod::SubmitTaskResultCommitment,
                ContractCall::SubmitTaskResultCommitment {
                    task_id,
                    round,
                    commitment: commitment.to_string(),
                },
            ))
        }

        async fn disclose_task_result(
            &self,
            task_id: TaskId,
            round: u32,
            result: &[u8],
        ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError> {
            Ok(self.submit(
                ContractMethod::DiscloseTaskResult,
                ContractCall::DiscloseTaskResult {
                    task_id,
                    round,
                    result: result.to_vec(),
                },
            ))
        }

        async fn report_results_uploaded(
            &self,
            task_id: TaskId,
            round: u32,
        ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError> {
            Ok(self.submit(
                ContractMethod::ReportResultsUploaded,
                ContractCall::ReportResultsUploaded { task_id, round },
            ))
        }

        async fn report_task_error(
            &self,
            task_id: TaskId,
            round: u32,
        ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError> {
            Ok(self.submit(
                ContractMethod::ReportTaskError,
                ContractCall::ReportTaskError { task_id, round },
            ))
        }

        async fn cancel_task(
            &self,
            task_id: TaskId,
        ) -> Result<(TxHash, Box<dyn TxWaiter>), ContractError> {
            // cancelTask has no persisted waiting-tx state in the data model,
            // so it is not keyed by ContractMethod; never scripted to revert.
            let mut state = self.state.lock();
            state.calls.push(ContractCall::CancelTask { task_id });
            state.next_hash += 1;
            let mut bytes = [0u8; 32];
            bytes[24..].copy_from_slice(&state.next_hash.to_be_bytes());
            Ok((TxHash(bytes), Box::new(FakeTxWaiter { revert: None })))
        }

        async fn get_task(&self, task_id: TaskId) -> Result<ChainTask, ContractError> {
            self.state
                .lock()
                .tasks
                .get(&task_id)
                .cloned()
                .ok_or(ContractError::TaskNotFound(task_id))
        }

        async fn resume(
            &self,
            method: ContractMethod,
            tx_hash: TxHash,
        ) -> Result<Box<dyn TxWaiter>, ContractError> {
            self.state
                .lock()
                .calls
                .push(ContractCall::Resume { method, tx_hash });
            Ok(Box::new(FakeTxWaiter { revert: None }))
        }
    }

    #[cfg(test)]
    #[path = "contract_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ContractCall, FakeContractClient, FakeTxWaiter};
