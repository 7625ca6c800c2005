// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events delivered to a task runner by the event queue.
//!
//! Every event carries the `task_id` it applies to so the task manager's
//! dispatcher can route it to the right runner's intake channel; the
//! queue separately hands out an `AckId` per delivery (see
//! `taskd_ports::queue::EventQueue`), kept out of the event body itself
//! since it is a property of the *delivery*, not of the event.

use crate::ids::TaskId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Protocol events that drive the task state machine.
///
/// Serializes with `{"type": "event:name", ...fields}`, matching the
/// tagged-union convention used for on-disk/queued records elsewhere in
/// this workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// This node has been selected for `task_id`, at the given `round`.
    #[serde(rename = "task:created")]
    TaskCreated { task_id: TaskId, round: u32 },

    /// Self-generated once the local worker has produced artifacts.
    /// `hashes` are lowercase-hex-encoded, `0x`-prefixed digests, one per
    /// entry in `files`, in the same order.
    #[serde(rename = "task:result_ready")]
    TaskResultReady {
        task_id: TaskId,
        hashes: Vec<String>,
        files: Vec<PathBuf>,
    },

    /// All peers have committed; safe to disclose.
    #[serde(rename = "task:commitments_ready")]
    TaskResultCommitmentsReady { task_id: TaskId },

    /// The task has been verified; `result_node` is the address chosen to
    /// upload the final artifacts.
    #[serde(rename = "task:success")]
    TaskSuccess {
        task_id: TaskId,
        result_node: String,
    },

    /// The task terminated on-chain without success.
    #[serde(rename = "task:aborted")]
    TaskAborted { task_id: TaskId },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::TaskCreated { task_id, .. }
            | TaskEvent::TaskResultReady { task_id, .. }
            | TaskEvent::TaskResultCommitmentsReady { task_id }
            | TaskEvent::TaskSuccess { task_id, .. }
            | TaskEvent::TaskAborted { task_id } => *task_id,
        }
    }

    /// Short tag for log lines and span fields, e.g. `"TaskCreated"`.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::TaskCreated { .. } => "TaskCreated",
            TaskEvent::TaskResultReady { .. } => "TaskResultReady",
            TaskEvent::TaskResultCommitmentsReady { .. } => "TaskResultCommitmentsReady",
            TaskEvent::TaskSuccess { .. } => "TaskSuccess",
            TaskEvent::TaskAborted { .. } => "TaskAborted",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
