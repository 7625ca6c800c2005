// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the per-task runner.
//!
//! `ContractError`, `RelayError`, and `WorkerError` each bundle several
//! error kinds the spec treats very differently (transient vs. permanent,
//! known-recoverable revert vs. any other revert, rejected input vs.
//! cancellation). Rather than re-deciding that classification by matching
//! on string content at every call site, it happens once, here, in the
//! `From` conversions — call sites match on the resulting typed variant.

use taskd_core::{CommitmentError, ContractMethod};
use taskd_ports::{CacheError, ContractError, QueueError, RelayError, WatcherError, WorkerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("state cache error: {0}")]
    Cache(#[from] CacheError),

    /// Connection drop, nonce race, and the like: propagate out of the
    /// handler so the event is returned to the deque for redelivery.
    #[error("transient chain error: {0}")]
    ChainTransient(String),
    /// A transaction reverted with a reason the runner recognizes as
    /// recoverable locally (currently: peers reported errors before this
    /// node's commitment landed).
    #[error("transaction reverted with a known reason: {0}")]
    RevertKnown(String),
    /// A transaction reverted for any other reason; propagates.
    #[error("transaction reverted: {0}")]
    RevertOther(String),
    /// Any other contract-client error (e.g. the task doesn't exist).
    #[error("contract error: {0}")]
    Contract(ContractError),

    /// The relay reported the task isn't registered or staged yet, and
    /// the handler's bounded backoff loop gave up before it appeared.
    #[error("transient relay error: {0}")]
    RelayTransient(String),
    #[error("relay error: {0}")]
    Relay(RelayError),

    /// The worker inspected the task inputs and rejected them.
    #[error("task input rejected by worker: {0}")]
    InvalidTask(String),
    #[error("worker error: {0}")]
    Worker(WorkerError),

    #[error("event queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),
    #[error("commitment error: {0}")]
    Commitment(#[from] CommitmentError),
    #[error("pending tx is for {found}, not {expected}; state is inconsistent")]
    InconsistentPendingTx {
        expected: ContractMethod,
        found: ContractMethod,
    },
    #[error("persisting state did not complete within its shielded budget")]
    PersistTimedOut,
    /// The task's deadline passed before it reached a terminal status.
    #[error("task deadline passed before reaching a terminal status")]
    Deadline,
    /// A handler was cancelled mid-flight (e.g. local worker execution cut
    /// short by the deadline or a shutdown).
    #[error("cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ContractError> for TaskError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Transient(msg) => TaskError::ChainTransient(msg),
            ContractError::Reverted(reason) if reason.contains("Task is aborted") => {
                TaskError::RevertKnown(reason)
            }
            ContractError::Reverted(reason) => TaskError::RevertOther(reason),
            other => TaskError::Contract(other),
        }
    }
}

impl From<RelayError> for TaskError {
    fn from(err: RelayError) -> Self {
        if err.is_transient() {
            TaskError::RelayTransient(err.to_string())
        } else {
            TaskError::Relay(err)
        }
    }
}

impl From<WorkerError> for TaskError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::TaskInvalid(reason) => TaskError::InvalidTask(reason),
            WorkerError::Cancelled => TaskError::Cancelled,
            other => TaskError::Worker(other),
        }
    }
}
