// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the set of live [`TaskRunner`]s, keyed by task id, and routes
//! deliveries from the external event queue to the right one — spawning a
//! fresh runner the first time a task is seen.

use crate::error::TaskError;
use crate::intake::{IntakeItem, IntakeSender};
use crate::runner::{RunnerDeps, TaskRunner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use taskd_core::{AckId, Clock, TaskEvent, TaskId};
use taskd_ports::{ContractClient, EventQueue, RelayClient, StateCache, Watcher, Worker};

/// Everything a freshly-spawned `TaskRunner` needs, minus the per-task
/// bits (`task_id`, `artifacts_root`) the manager fills in itself.
pub struct ManagerDeps {
    pub cache: Arc<dyn StateCache>,
    pub contract: Arc<dyn ContractClient>,
    pub relay: Arc<dyn RelayClient>,
    pub worker: Arc<dyn Worker>,
    pub watcher: Arc<dyn Watcher>,
    pub event_queue: Arc<dyn EventQueue>,
    pub account: String,
    /// Parent directory under which one subdirectory per task is created
    /// for local worker output.
    pub artifacts_root: PathBuf,
}

/// Registry of live task runners plus the dispatcher loop that feeds them
/// from the shared event queue.
pub struct TaskManager<C: Clock> {
    deps: ManagerDeps,
    clock: C,
    intakes: Mutex<HashMap<TaskId, IntakeSender>>,
}

impl<C: Clock> TaskManager<C> {
    pub fn new(deps: ManagerDeps, clock: C) -> Arc<Self> {
        Arc::new(Self {
            deps,
            clock,
            intakes: Mutex::new(HashMap::new()),
        })
    }

    /// Pulls events from the shared queue forever, dispatching each to its
    /// runner. Returns only if the queue itself closes.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.deps.event_queue.recv().await {
                Ok((ack_id, event)) => self.dispatch(ack_id, event).await,
                Err(err) => {
                    tracing::error!(error = %err, "event queue closed; manager loop exiting");
                    return;
                }
            }
        }
    }

    /// Routes one delivery to the task's runner, spawning a fresh one on
    /// first sight of the task. Spawning failures are logged; the delivery
    /// is left un-acked so the queue redelivers it once recovered.
    pub async fn dispatch(self: &Arc<Self>, ack_id: AckId, event: TaskEvent) {
        let task_id = event.task_id();
        let item = IntakeItem {
            ack_id: Some(ack_id),
            event,
        };

        let existing = self.intakes.lock().get(&task_id).cloned();
        if let Some(tx) = existing {
            if tx.send(item).is_ok() {
                return;
            }
            // Runner already exited; fall through and spawn a new one.
            self.intakes.lock().remove(&task_id);
        }

        if let Err((_item, err)) = self.spawn_task(task_id, item).await {
            tracing::error!(%task_id, error = %err, "failed to spawn task runner");
            let _ = self.deps.event_queue.no_ack(ack_id).await;
        }
    }

    /// Builds a runner for a task seen for the first time, hands it the
    /// triggering event, and tracks it until `run()`/`start()` completes.
    async fn spawn_task(
        self: &Arc<Self>,
        task_id: TaskId,
        item: IntakeItem,
    ) -> Result<(), (IntakeItem, TaskError)> {
        let runner_deps = RunnerDeps {
            cache: self.deps.cache.clone(),
            contract: self.deps.contract.clone(),
            relay: self.deps.relay.clone(),
            worker: self.deps.worker.clone(),
            watcher: self.deps.watcher.clone(),
            event_queue: self.deps.event_queue.clone(),
            account: self.deps.account.clone(),
            artifacts_root: self.deps.artifacts_root.join(task_id.get().to_string()),
        };

        let (runner, intake_tx) = TaskRunner::new(task_id, runner_deps, self.clock.clone());
        if let Err(item) = intake_tx.send(item) {
            return Err((item, TaskError::Internal("runner intake closed immediately".into())));
        }

        self.intakes.lock().insert(task_id, intake_tx);

        let manager = self.clone();
        tokio::spawn(async move {
            let terminal = runner.start().await;
            tracing::info!(%task_id, status = ?terminal, "task runner exited");
            manager.intakes.lock().remove(&task_id);
        });

        Ok(())
    }

    /// Number of task runners currently tracked; mostly useful for tests.
    pub fn active_task_count(&self) -> usize {
        self.intakes.lock().len()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
