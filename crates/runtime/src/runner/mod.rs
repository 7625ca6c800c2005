// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-task state machine: lifecycle, durable state-context, chain-call
//! coordinator, and event handlers.

mod coordinator;
mod handlers;
mod lifecycle;
mod state_context;

use crate::intake::{IntakeItem, IntakeReceiver, IntakeSender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use taskd_core::{AckId, Clock, TaskId, TaskState, TaskStatus};
use taskd_ports::{ContractClient, EventQueue, RelayClient, StateCache, Watcher, Worker};
use tokio::sync::watch;

/// Everything one `TaskRunner` needs from the outside world, injected
/// through the constructor so tests can substitute fakes for any of them.
pub struct RunnerDeps {
    pub cache: Arc<dyn StateCache>,
    pub contract: Arc<dyn ContractClient>,
    pub relay: Arc<dyn RelayClient>,
    pub worker: Arc<dyn Worker>,
    pub watcher: Arc<dyn Watcher>,
    pub event_queue: Arc<dyn EventQueue>,
    /// This node's on-chain address; compared against `result_node` to
    /// decide whether this node uploads the final artifacts.
    pub account: String,
    /// Root directory under which per-task artifact directories are
    /// created for local worker execution.
    pub artifacts_root: PathBuf,
}

/// Durable, event-driven coordinator for one on-chain task.
///
/// Cloning shares the same underlying state; clone to obtain a handle for
/// a spawned handler task (`Arc` semantics via internal sharing).
pub struct TaskRunner<C: Clock> {
    pub(crate) task_id: TaskId,
    pub(crate) deps: RunnerDeps,
    pub(crate) clock: C,
    pub(crate) state: Mutex<TaskState>,
    pub(crate) status_tx: watch::Sender<TaskStatus>,
    pub(crate) watch_ids: Mutex<Vec<taskd_ports::WatchId>>,
    pub(crate) outstanding: Mutex<HashMap<AckId, taskd_core::TaskEvent>>,
    /// Ack ids whose handler already failed with a propagated (transient)
    /// error. These are always no-acked at drain time, regardless of how
    /// the task itself ended up exiting — see `drain`.
    pub(crate) failed: Mutex<HashSet<AckId>>,
    pub(crate) intake_rx: tokio::sync::Mutex<IntakeReceiver>,
    pub(crate) intake_tx: IntakeSender,
}

impl<C: Clock> TaskRunner<C> {
    /// Builds a fresh runner and the sender half the dispatcher uses to
    /// feed it events.
    pub fn new(task_id: TaskId, deps: RunnerDeps, clock: C) -> (Arc<Self>, IntakeSender) {
        let (intake_tx, intake_rx) = crate::intake::channel();
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        let runner = Arc::new(Self {
            task_id,
            deps,
            clock,
            state: Mutex::new(TaskState::new(task_id)),
            status_tx,
            watch_ids: Mutex::new(Vec::new()),
            outstanding: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
            intake_rx: tokio::sync::Mutex::new(intake_rx),
            intake_tx: intake_tx.clone(),
        });
        (runner, intake_tx)
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    pub fn state(&self) -> TaskState {
        self.state.lock().clone()
    }

    /// Directory local worker execution writes artifacts into.
    pub(crate) fn output_dir(&self) -> PathBuf {
        self.deps.artifacts_root.clone()
    }

    fn self_enqueue(&self, event: taskd_core::TaskEvent) {
        let _ = self.intake_tx.send(IntakeItem { ack_id: None, event });
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
