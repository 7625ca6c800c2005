// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! taskd-daemon: process bootstrap for the per-task runner.
//!
//! Owns configuration loading, the single-instance lock file, logging
//! setup, and wiring the external collaborators `taskd-runtime` needs
//! into a [`TaskManager`]. The daemon has no control-plane protocol of
//! its own; it starts, runs the manager loop until a shutdown signal,
//! and stops.

pub mod config;
pub mod env;
pub mod error;

use std::sync::Arc;
use taskd_core::SystemClock;
use taskd_ports::{
    FakeContractClient, FakeEventQueue, FakeWatcher, FakeWorker, FileStateCache, HttpRelayClient,
};
use taskd_runtime::{ManagerDeps, TaskManager};

pub use config::Config;
pub use error::DaemonError;

/// Builds the collaborator set the manager needs, from a loaded [`Config`].
///
/// `cache` and `relay` are real, durable implementations. `contract`,
/// `watcher`, and `event_queue` are in-memory stand-ins: the chain client,
/// the chain watcher, and the queue are external dependencies with no
/// concrete wire protocol to integrate against yet (see DESIGN.md).
/// `worker` likewise stands in for the distributed dispatch path, since
/// local execution of a task's inference work is out of scope here. A
/// deployment with a real chain integration substitutes its own
/// implementations of these four traits through the same `ManagerDeps`
/// seam.
pub fn build_manager_deps(config: &Config) -> ManagerDeps {
    ManagerDeps {
        cache: Arc::new(FileStateCache::new(config.cache_dir.clone())),
        contract: Arc::new(FakeContractClient::new()),
        relay: Arc::new(HttpRelayClient::new(config.relay_base_url.clone())),
        worker: Arc::new(FakeWorker::dispatching()),
        watcher: Arc::new(FakeWatcher::new()),
        event_queue: Arc::new(FakeEventQueue::new()),
        account: config.account.clone(),
        artifacts_root: config.artifacts_dir.clone(),
    }
}

/// Builds a `TaskManager` wired per [`build_manager_deps`], using the
/// system clock.
pub fn build_manager(config: &Config) -> Arc<TaskManager<SystemClock>> {
    TaskManager::new(build_manager_deps(config), SystemClock)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
