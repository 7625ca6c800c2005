// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-event handlers. Each synchronizes on the predecessor status it
//! requires, then advances the state machine by one step.

use super::TaskRunner;
use crate::error::TaskError;
use crate::intake::IntakeItem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskd_core::{make_result_commitments, Clock, ContractMethod, TaskEvent, TaskStatus};
use taskd_ports::{hash_artifact, RelayError, TaskArgs, WorkerError, WorkerOutcome};
use tokio_util::sync::CancellationToken;

/// Relay retries "not found"/"not ready" for up to this long before
/// giving up and propagating the error.
const RELAY_RETRY_BUDGET: Duration = Duration::from_secs(30 * 60);
const FAST_RETRY_ATTEMPTS: u32 = 30;
const FAST_RETRY_DELAY: Duration = Duration::from_secs(1);
const SLOW_RETRY_DELAY: Duration = Duration::from_secs(10);
const INVALID_TASK_REPORT_BUDGET: Duration = Duration::from_secs(60);

impl<C: Clock> TaskRunner<C> {
    /// Blocks until `status` reaches `predecessor` or a terminal status,
    /// tolerating out-of-order delivery of later-stage events.
    pub(crate) async fn wait_for_status(&self, predecessor: TaskStatus) -> TaskStatus {
        let mut rx = self.status_tx.subscribe();
        loop {
            let current = *rx.borrow();
            if current == predecessor || current.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                return current;
            }
        }
    }

    /// Runs one buffered delivery to completion. Returns the terminal
    /// status once the task has reached one, so the run loop knows to
    /// stop. Acks the delivery as soon as the handler's state mutation has
    /// committed. On error, no-acks the delivery immediately so the queue
    /// can redeliver it without waiting on whatever terminal status (if
    /// any) the task eventually reaches — see `lifecycle::drain`, which
    /// only applies its ack-on-terminal/no-ack-otherwise blanket rule to
    /// deliveries that never reached either outcome here.
    pub(crate) async fn handle_event(self: &Arc<Self>, item: IntakeItem) -> Result<Option<TaskStatus>, TaskError> {
        if let Some(ack_id) = item.ack_id {
            self.outstanding.lock().insert(ack_id, item.event.clone());
        }

        let result = match item.event {
            TaskEvent::TaskCreated { round, .. } => self.handle_task_created(round).await,
            TaskEvent::TaskResultReady { hashes, files, .. } => {
                self.handle_result_ready(hashes, files).await
            }
            TaskEvent::TaskResultCommitmentsReady { .. } => self.handle_commitments_ready().await,
            TaskEvent::TaskSuccess { result_node, .. } => self.handle_task_success(result_node).await,
            TaskEvent::TaskAborted { .. } => self.handle_task_aborted().await,
        };

        match result {
            Ok(()) => {
                if let Some(ack_id) = item.ack_id {
                    self.outstanding.lock().remove(&ack_id);
                    let _ = self.deps.event_queue.ack(ack_id).await;
                }
                let status = self.status();
                Ok(status.is_terminal().then_some(status))
            }
            Err(err) => {
                if let Some(ack_id) = item.ack_id {
                    self.failed.lock().insert(ack_id);
                    if self.deps.event_queue.no_ack(ack_id).await.is_ok() {
                        self.outstanding.lock().remove(&ack_id);
                        self.failed.lock().remove(&ack_id);
                    }
                }
                Err(err)
            }
        }
    }

    async fn handle_task_created(self: &Arc<Self>, round: u32) -> Result<(), TaskError> {
        let status = self.wait_for_status(TaskStatus::Pending).await;
        if status != TaskStatus::Pending {
            return Ok(());
        }

        self.state_context(|s| s.round = round).await?;

        let args = self.fetch_task_args_with_retry().await?;
        let cancel = CancellationToken::new();
        let outcome = self
            .deps
            .worker
            .run(self.task_id, &args, &self.output_dir(), cancel)
            .await;

        match outcome {
            Ok(WorkerOutcome::Produced(files)) => {
                let mut hashes = Vec::with_capacity(files.len());
                for file in &files {
                    hashes.push(hash_artifact(file).await?);
                }
                self.self_enqueue(TaskEvent::TaskResultReady {
                    task_id: self.task_id,
                    hashes,
                    files,
                });
            }
            Ok(WorkerOutcome::Dispatched) => {
                // Remote worker drives the rest of the protocol independently.
            }
            Err(WorkerError::TaskInvalid(reason)) => {
                return self.report_invalid_task(reason).await;
            }
            Err(err) => return Err(err.into()),
        }

        self.state_context(|s| s.status = TaskStatus::Executing).await
    }

    async fn handle_result_ready(
        &self,
        hashes: Vec<String>,
        files: Vec<PathBuf>,
    ) -> Result<(), TaskError> {
        let status = self.wait_for_status(TaskStatus::Executing).await;
        if status != TaskStatus::Executing {
            return Ok(());
        }

        let already_submitted = !self.state.lock().result.is_empty();
        if !already_submitted {
            let commitment = make_result_commitments(&hashes)?;
            let round = self.state.lock().round;
            let task_id = self.task_id;
            let contract = self.deps.contract.clone();
            let commitment_hex = commitment.commitment.clone();

            let submit_result = self
                .run_coordinated(ContractMethod::SubmitTaskResultCommitment, move || {
                    Box::pin(async move {
                        contract
                            .submit_task_result_commitment(task_id, round, &commitment_hex)
                            .await
                    })
                })
                .await;

            if let Err(TaskError::RevertKnown(_)) = &submit_result {
                return self.handle_peer_abort().await;
            }
            submit_result?;

            self.state_context(|s| {
                s.result = commitment.result.clone();
                s.files = files.clone();
            })
            .await?;
        }

        self.state_context(|s| s.status = TaskStatus::ResultUploaded).await
    }

    async fn handle_commitments_ready(&self) -> Result<(), TaskError> {
        let status = self.wait_for_status(TaskStatus::ResultUploaded).await;
        if status != TaskStatus::ResultUploaded {
            return Ok(());
        }

        let already_disclosed = self.state.lock().disclosed;
        if !already_disclosed {
            let (result, round) = {
                let s = self.state.lock();
                (s.result.clone(), s.round)
            };
            let task_id = self.task_id;
            let contract = self.deps.contract.clone();

            self.run_coordinated(ContractMethod::DiscloseTaskResult, move || {
                Box::pin(async move { contract.disclose_task_result(task_id, round, &result).await })
            })
            .await?;

            self.state_context(|s| s.disclosed = true).await?;
        }

        self.state_context(|s| s.status = TaskStatus::Disclosed).await
    }

    async fn handle_task_success(&self, result_node: String) -> Result<(), TaskError> {
        let status = self.wait_for_status(TaskStatus::Disclosed).await;
        if status != TaskStatus::Disclosed {
            return Ok(());
        }

        if result_node == self.deps.account {
            let files = self.state.lock().files.clone();
            self.deps.relay.upload_task_result(self.task_id, &files).await?;

            let round = self.state.lock().round;
            let task_id = self.task_id;
            let contract = self.deps.contract.clone();
            self.run_coordinated(ContractMethod::ReportResultsUploaded, move || {
                Box::pin(async move { contract.report_results_uploaded(task_id, round).await })
            })
            .await?;
        }

        self.state_context(|s| s.status = TaskStatus::Success).await
    }

    async fn handle_task_aborted(&self) -> Result<(), TaskError> {
        if self.status().is_terminal() {
            return Ok(());
        }
        self.state_context(|s| s.status = TaskStatus::Aborted).await
    }

    async fn handle_peer_abort(&self) -> Result<(), TaskError> {
        self.state_context(|s| s.status = TaskStatus::Aborted).await?;
        let round = self.state.lock().round;
        let task_id = self.task_id;
        let contract = self.deps.contract.clone();
        self.run_coordinated(ContractMethod::ReportTaskError, move || {
            Box::pin(async move { contract.report_task_error(task_id, round).await })
        })
        .await
    }

    /// Reports the invalid-task revert under a shielded budget: the actual
    /// call runs in its own detached `tokio::spawn`, the same way
    /// `state_context`'s persist, `drain`, and `cleanup` shield their
    /// protected work, so a concurrent `handlers.abort_all()` (fired by the
    /// deadline branch) can't hard-abort it mid-flight.
    async fn report_invalid_task(self: &Arc<Self>, reason: String) -> Result<(), TaskError> {
        tracing::warn!(task_id = %self.task_id, %reason, "worker reported task invalid");
        let round = self.state.lock().round;
        let task_id = self.task_id;
        let contract = self.deps.contract.clone();
        let runner = self.clone();

        let handle = tokio::spawn(async move {
            runner
                .run_coordinated(ContractMethod::ReportTaskError, move || {
                    Box::pin(async move { contract.report_task_error(task_id, round).await })
                })
                .await
        });

        match tokio::time::timeout(INVALID_TASK_REPORT_BUDGET, handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => {
                tracing::warn!(task_id = %self.task_id, error = %err, "reportTaskError failed");
            }
            Ok(Err(join_err)) => {
                tracing::warn!(task_id = %self.task_id, error = %join_err, "reportTaskError task panicked");
            }
            Err(_) => {
                tracing::warn!(task_id = %self.task_id, "reportTaskError did not complete within its budget");
            }
        }

        self.state_context(|s| s.status = TaskStatus::Aborted).await
    }

    async fn fetch_task_args_with_retry(&self) -> Result<TaskArgs, TaskError> {
        let start = tokio::time::Instant::now();
        let mut attempt: u32 = 0;
        loop {
            match self.deps.relay.get_task(self.task_id).await {
                Ok(args) => return Ok(args),
                Err(err) if matches!(err, RelayError::NotFound(_) | RelayError::NotReady(_)) => {
                    if start.elapsed() >= RELAY_RETRY_BUDGET {
                        return Err(err.into());
                    }
                    attempt += 1;
                    let delay = if attempt <= FAST_RETRY_ATTEMPTS {
                        FAST_RETRY_DELAY
                    } else {
                        SLOW_RETRY_DELAY
                    };
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
