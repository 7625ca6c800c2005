// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: fixed paths under one state directory, plus the
//! handful of values that come from the environment rather than disk.

use crate::env;
use crate::error::DaemonError;
use std::path::PathBuf;

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. `~/.local/state/taskd`).
    pub state_dir: PathBuf,
    /// Path to the lock/PID file preventing two daemons running at once.
    pub lock_path: PathBuf,
    /// Path to the daemon's own log file.
    pub log_path: PathBuf,
    /// Directory holding one JSON file per task's durable state.
    pub cache_dir: PathBuf,
    /// Parent directory under which per-task artifact directories are
    /// created for local worker execution.
    pub artifacts_dir: PathBuf,
    /// This node's on-chain address.
    pub account: String,
    /// Base URL of the relay service.
    pub relay_base_url: String,
}

impl Config {
    /// Loads configuration for this node's daemon.
    ///
    /// Uses fixed paths under the resolved state directory; one daemon
    /// serves one on-chain account.
    pub fn load() -> Result<Self, DaemonError> {
        let state_dir = env::state_dir()?;

        Ok(Self {
            lock_path: state_dir.join("taskd.pid"),
            log_path: state_dir.join("taskd.log"),
            cache_dir: state_dir.join("tasks"),
            artifacts_dir: state_dir.join("artifacts"),
            account: env::account()?,
            relay_base_url: env::relay_base_url(),
            state_dir,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
