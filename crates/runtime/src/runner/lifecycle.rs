// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner lifecycle: load-or-create, the bounded-time run loop, drain on
//! exit, and cleanup.

use super::TaskRunner;
use crate::error::TaskError;
use crate::intake::IntakeItem;
use std::sync::Arc;
use std::time::Duration;
use taskd_core::{Clock, TaskEvent, TaskState, TaskStatus};
use taskd_ports::EventCallback;
use tokio::task::JoinSet;

const DRAIN_BUDGET: Duration = Duration::from_secs(10);
const CLEANUP_BUDGET: Duration = Duration::from_secs(10);

impl<C: Clock> TaskRunner<C> {
    /// Loads this task's durable state, or creates a fresh record. Returns
    /// `true` if the runner should skip straight to exit: either the task
    /// was already terminal, or it doesn't exist on chain.
    pub async fn init(&self) -> Result<bool, TaskError> {
        let existing = self.deps.cache.has(self.task_id).await?;
        let mut state = if existing {
            self.deps.cache.load(self.task_id).await?
        } else {
            TaskState::new(self.task_id)
        };

        if state.status.is_terminal() {
            self.adopt(state);
            return Ok(true);
        }

        match self.deps.contract.get_task(self.task_id).await {
            Ok(chain_task) if chain_task.id == self.task_id => {
                state.timeout = chain_task.timeout;
                self.deps.cache.dump(&state).await?;
                self.adopt(state);
                Ok(false)
            }
            _ => {
                state.status = TaskStatus::Aborted;
                self.deps.cache.dump(&state).await?;
                self.adopt(state);
                Ok(true)
            }
        }
    }

    fn adopt(&self, state: TaskState) {
        let status = state.status;
        *self.state.lock() = state;
        let _ = self.status_tx.send(status);
    }

    /// Loads or creates state, then either exits immediately (terminal
    /// state, or the task doesn't exist on chain) or runs the event loop
    /// to completion. This is the single entry point the dispatcher uses
    /// to drive one runner's whole lifecycle.
    pub async fn start(self: Arc<Self>) -> TaskStatus {
        match self.init().await {
            Ok(true) => {
                let status = self.status();
                self.drain_and_exit(status).await
            }
            Ok(false) => {
                if let Err(err) = self.subscribe_watches().await {
                    tracing::warn!(task_id = %self.task_id, error = %err, "failed to subscribe task watches");
                }
                self.run().await
            }
            Err(err) => {
                tracing::error!(task_id = %self.task_id, error = %err, "task init failed");
                self.status()
            }
        }
    }

    /// Runs the event loop until the task reaches a terminal status or the
    /// deadline passes, then drains and (on terminal exit) cleans up.
    async fn run(self: Arc<Self>) -> TaskStatus {
        let now = self.clock.unix_timestamp();
        let timeout = self.state.lock().timeout;
        let remaining = timeout.saturating_sub(now);

        if remaining == 0 {
            return self.take_deadline_path().await;
        }

        let deadline = tokio::time::sleep(Duration::from_secs(remaining));
        tokio::pin!(deadline);
        let mut handlers: JoinSet<Result<Option<TaskStatus>, TaskError>> = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    handlers.abort_all();
                    return self.take_deadline_path().await;
                }
                item = self.recv_intake() => {
                    match item {
                        Some(item) => {
                            let runner = self.clone();
                            handlers.spawn(async move { runner.handle_event(item).await });
                        }
                        None => {
                            // Dispatcher dropped its sender (shutdown); exit
                            // without forcing a status this runner never reached.
                            handlers.abort_all();
                            let status = self.status();
                            return self.drain_and_exit(status).await;
                        }
                    }
                }
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    match joined {
                        Ok(Ok(Some(terminal))) => {
                            handlers.abort_all();
                            return self.drain_and_exit(terminal).await;
                        }
                        Ok(Ok(None)) => {}
                        Ok(Err(err)) => {
                            // `handle_event` has already no-acked this delivery's
                            // ack_id so the queue redelivers it; this is purely
                            // for observability.
                            tracing::warn!(task_id = %self.task_id, error = %err, "event handler failed");
                        }
                        Err(join_err) => {
                            tracing::warn!(task_id = %self.task_id, error = %join_err, "event handler task panicked");
                        }
                    }
                }
            }
        }
    }

    pub(crate) async fn recv_intake(&self) -> Option<IntakeItem> {
        let mut rx = self.intake_rx.lock().await;
        rx.recv().await
    }

    async fn take_deadline_path(self: &Arc<Self>) -> TaskStatus {
        let _ = self.state_context(|s| s.status = TaskStatus::Aborted).await;
        match self.deps.contract.cancel_task(self.task_id).await {
            Ok((_, waiter)) => {
                if let Err(err) = waiter.wait().await {
                    tracing::warn!(task_id = %self.task_id, error = %err, "cancelTask reverted");
                }
            }
            Err(err) => {
                tracing::warn!(task_id = %self.task_id, error = %err, "cancelTask submission failed");
            }
        }
        self.drain_and_exit(TaskStatus::Aborted).await
    }

    async fn drain_and_exit(self: &Arc<Self>, terminal: TaskStatus) -> TaskStatus {
        self.drain(terminal).await;
        if terminal.is_terminal() {
            self.cleanup().await;
        }
        terminal
    }

    /// Acks every still-outstanding delivery if the task ended terminal,
    /// otherwise no-acks all of them so another runner instance can
    /// reprocess — except deliveries whose handler already failed with a
    /// propagated error (tracked in `failed`), which are always no-acked
    /// for redelivery regardless of how the task itself ended up exiting;
    /// a terminal status reached by some other event doesn't make a
    /// separate transient failure any less worth retrying. Runs under a
    /// shielded budget so teardown always makes progress.
    async fn drain(&self, terminal: TaskStatus) {
        let drained = self.intake_rx.lock().drain();
        for item in drained {
            if let Some(ack_id) = item.ack_id {
                self.outstanding.lock().insert(ack_id, item.event);
            }
        }

        let outstanding: Vec<_> = self.outstanding.lock().keys().copied().collect();
        let failed_ids = std::mem::take(&mut *self.failed.lock());
        let is_terminal = terminal.is_terminal();
        let queue = self.deps.event_queue.clone();

        let handle = tokio::spawn(async move {
            for ack_id in outstanding {
                let should_ack = is_terminal && !failed_ids.contains(&ack_id);
                let outcome = if should_ack {
                    queue.ack(ack_id).await
                } else {
                    queue.no_ack(ack_id).await
                };
                if let Err(err) = outcome {
                    tracing::warn!(%ack_id, error = %err, "drain ack/no-ack failed");
                }
            }
        });
        if tokio::time::timeout(DRAIN_BUDGET, handle).await.is_err() {
            tracing::warn!(task_id = %self.task_id, "drain did not complete within its budget");
        }
        self.outstanding.lock().clear();
        self.failed.lock().clear();
    }

    /// Unsubscribes the task's watches and removes its artifact directory.
    /// Idempotent; safe to call more than once.
    async fn cleanup(&self) {
        let watch_ids: Vec<_> = self.watch_ids.lock().drain(..).collect();
        let watcher = self.deps.watcher.clone();
        let files = self.state.lock().files.clone();

        let handle = tokio::spawn(async move {
            for watch_id in watch_ids {
                if let Err(err) = watcher.unwatch_event(watch_id).await {
                    tracing::warn!(%watch_id, error = %err, "unwatch failed");
                }
            }
            if let Some(parent) = files.first().and_then(|f| f.parent()) {
                if let Err(err) = tokio::fs::remove_dir_all(parent).await {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %parent.display(), error = %err, "artifact cleanup failed");
                    }
                }
            }
        });
        if tokio::time::timeout(CLEANUP_BUDGET, handle).await.is_err() {
            tracing::warn!(task_id = %self.task_id, "cleanup did not complete within its budget");
        }
    }

    pub fn record_watch(&self, watch_id: taskd_ports::WatchId) {
        self.watch_ids.lock().push(watch_id);
    }

    /// Subscribes the three chain-log filters this task needs once it is
    /// confirmed to exist on chain: the external watcher pushes chain
    /// events into the shared event queue. Each callback translates raw
    /// event data into a `TaskEvent` and pushes it back onto the shared
    /// queue, so delivery (and this runner's routing) goes through the
    /// same ack/no-ack path as every other event.
    async fn subscribe_watches(&self) -> Result<(), TaskError> {
        let task_id = self.task_id;
        let filter_args = serde_json::json!({ "taskId": task_id.get() });

        let commitments = self
            .deps
            .watcher
            .watch_event(
                "task",
                "TaskResultCommitmentsReady",
                push_to_queue(self.deps.event_queue.clone(), move |_raw| {
                    TaskEvent::TaskResultCommitmentsReady { task_id }
                }),
                filter_args.clone(),
            )
            .await?;
        self.record_watch(commitments);

        let success = self
            .deps
            .watcher
            .watch_event(
                "task",
                "TaskSuccess",
                push_to_queue(self.deps.event_queue.clone(), move |raw| {
                    let result_node = raw
                        .get("resultNode")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    TaskEvent::TaskSuccess { task_id, result_node }
                }),
                filter_args.clone(),
            )
            .await?;
        self.record_watch(success);

        let aborted = self
            .deps
            .watcher
            .watch_event(
                "task",
                "TaskAborted",
                push_to_queue(self.deps.event_queue.clone(), move |_raw| {
                    TaskEvent::TaskAborted { task_id }
                }),
                filter_args,
            )
            .await?;
        self.record_watch(aborted);

        Ok(())
    }
}

/// Builds a `Watcher` callback that translates raw chain event data with
/// `translate` and pushes the resulting `TaskEvent` onto `queue`. The
/// `Watcher` trait's callback is synchronous, so the (fallible, async)
/// enqueue is spawned rather than awaited in place.
fn push_to_queue<F>(queue: Arc<dyn taskd_ports::EventQueue>, translate: F) -> EventCallback
where
    F: Fn(serde_json::Value) -> TaskEvent + Send + Sync + 'static,
{
    Arc::new(move |raw: serde_json::Value| {
        let event = translate(raw);
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(err) = queue.put(event).await {
                tracing::warn!(error = %err, "failed to enqueue watched chain event");
            }
        });
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
