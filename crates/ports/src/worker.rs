// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local or remote execution of a task's inference work.

use crate::relay::TaskArgs;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use taskd_core::TaskId;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker inspected the task inputs and rejected them; the runner
    /// reports this on-chain and aborts rather than retrying.
    #[error("task invalid: {0}")]
    TaskInvalid(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        WorkerError::Io(e.to_string())
    }
}

/// What running a task produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Local execution produced these artifacts, in deterministic order;
    /// the caller hashes them and enqueues `TaskResultReady`.
    Produced(Vec<PathBuf>),
    /// The job was handed to a remote worker, which is expected to report
    /// result readiness (and drive the rest of the protocol) independently.
    Dispatched,
}

/// Executes a task's inference work, either in-process on a cancellable
/// blocking thread, or by dispatching to a remote job service.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    async fn run(
        &self,
        task_id: TaskId,
        args: &TaskArgs,
        output_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError>;
}

/// Hashes one artifact with the digest used for commitment material.
/// Returns a lowercase, `0x`-prefixed hex string.
pub async fn hash_artifact(path: &Path) -> Result<String, WorkerError> {
    let bytes = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("0x{}", hex::encode(hasher.finalize())))
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub struct WorkerCall {
        pub task_id: TaskId,
        pub output_dir: PathBuf,
    }

    enum Script {
        Produce(Vec<PathBuf>),
        Dispatch,
        Fail(WorkerError),
    }

    struct FakeWorkerState {
        calls: Vec<WorkerCall>,
        script: Script,
    }

    /// In-memory `Worker` for tests; configured up front with the outcome
    /// to return.
    #[derive(Clone)]
    pub struct FakeWorker {
        state: Arc<Mutex<FakeWorkerState>>,
    }

    impl FakeWorker {
        pub fn producing(files: Vec<PathBuf>) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeWorkerState {
                    calls: Vec::new(),
                    script: Script::Produce(files),
                })),
            }
        }

        pub fn dispatching() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeWorkerState {
                    calls: Vec::new(),
                    script: Script::Dispatch,
                })),
            }
        }

        pub fn failing(err: WorkerError) -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeWorkerState {
                    calls: Vec::new(),
                    script: Script::Fail(err),
                })),
            }
        }

        pub fn calls(&self) -> Vec<WorkerCall> {
            self.state.lock().calls.clone()
        }
    }

    #[async_trait]
    impl Worker for FakeWorker {
        async fn run(
            &self,
            task_id: TaskId,
            _args: &TaskArgs,
            output_dir: &Path,
            _cancel: CancellationToken,
        ) -> Result<WorkerOutcome, WorkerError> {
            let mut state = self.state.lock();
            state.calls.push(WorkerCall {
                task_id,
                output_dir: output_dir.to_path_buf(),
            });
            match &state.script {
                Script::Produce(files) => Ok(WorkerOutcome::Produced(files.clone())),
                Script::Dispatch => Ok(WorkerOutcome::Dispatched),
                Script::Fail(err) => Err(err.clone()),
            }
        }
    }

    #[cfg(test)]
    #[path = "worker_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorker, WorkerCall};
