// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::error::DaemonError;
use std::path::PathBuf;

/// Resolve state directory: `TASKD_STATE_DIR` > `XDG_STATE_HOME`/taskd >
/// `~/.local/state/taskd`.
pub fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("TASKD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("taskd"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/taskd"))
}

/// This node's on-chain address, compared against `result_node` to decide
/// whether this node uploads final artifacts.
pub fn account() -> Result<String, DaemonError> {
    std::env::var("TASKD_ACCOUNT").map_err(|_| DaemonError::MissingAccount)
}

/// Base URL of the relay service. Defaults to a local relay for
/// single-node development; production deployments set this explicitly.
pub fn relay_base_url() -> String {
    std::env::var("TASKD_RELAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8094".to_string())
}
