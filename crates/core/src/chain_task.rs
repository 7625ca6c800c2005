// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only projection of a task as it exists on-chain.

use crate::ids::TaskId;
use serde::{Deserialize, Serialize};

/// Snapshot of a task's on-chain record, as returned by
/// `ContractClient::get_task`. The runner only reads this to confirm the
/// task exists, learn the authoritative timeout, and learn which node was
/// chosen to upload final artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTask {
    pub id: TaskId,
    /// Absolute deadline, seconds since the Unix epoch.
    pub timeout: u64,
    pub selected_nodes: Vec<String>,
    pub commitments: Vec<Vec<u8>>,
    /// Address chosen to upload final artifacts, if the task has
    /// progressed far enough to have one.
    pub result_node: Option<String>,
    pub aborted: bool,
}

#[cfg(test)]
#[path = "chain_task_tests.rs"]
mod tests;
