// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-task state record.

use crate::ids::TaskId;
use crate::status::TaskStatus;
use crate::tx::{ContractMethod, TxHash};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contract call the coordinator has submitted but not yet confirmed.
///
/// Bundling method and hash into one optional field (rather than two
/// independently-nullable ones) makes the data-model invariant "both
/// empty or both set" unrepresentable instead of merely documented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub method: ContractMethod,
    pub tx_hash: TxHash,
}

/// Durable state for one task, persisted by the state cache on every exit
/// from a `state_context` scope (see `taskd-runtime::state_context`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: TaskId,
    /// This node's assigned round within the task. Zero until TaskCreated
    /// is processed; nonzero for any non-Pending status.
    #[serde(default)]
    pub round: u32,
    /// Absolute deadline, seconds since the Unix epoch.
    #[serde(default)]
    pub timeout: u64,
    pub status: TaskStatus,
    /// Locally computed commitment material. Empty until the commitment
    /// has been submitted.
    #[serde(default)]
    pub result: Vec<u8>,
    #[serde(default)]
    pub disclosed: bool,
    /// Ordered local artifact paths produced by the worker.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub waiting_tx: Option<PendingTx>,
}

impl TaskState {
    /// A freshly created record for a task this runner has not seen before.
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            round: 0,
            timeout: 0,
            status: TaskStatus::Pending,
            result: Vec::new(),
            disclosed: false,
            files: Vec::new(),
            waiting_tx: None,
        }
    }

    /// Data-model invariants, checked in tests and available to callers
    /// that want to assert state consistency after a mutation.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.status != TaskStatus::Pending && self.round == 0 {
            return Err("round must be nonzero once status has left Pending");
        }
        if matches!(
            self.status,
            TaskStatus::ResultUploaded | TaskStatus::Disclosed | TaskStatus::Success
        ) && self.result.is_empty()
        {
            return Err("result must be non-empty once ResultUploaded has been reached");
        }
        if self.disclosed && !matches!(self.status, TaskStatus::Disclosed | TaskStatus::Success) {
            return Err("disclosed implies status is Disclosed or Success");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
