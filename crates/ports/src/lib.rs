// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! taskd-ports: traits for every external collaborator the task runner
//! depends on, plus the real and in-memory implementations of them.
//!
//! The watcher, contract client, relay client, and distributed worker have
//! no fixed wire shape here, so only trait + fake are provided; tests and
//! the daemon wire concrete implementations of these in through the
//! runner constructor. The state cache and (HTTP) relay client additionally
//! get a real implementation, since their storage and wire shapes are
//! well-defined.

pub mod cache;
pub mod contract;
pub mod queue;
pub mod relay;
pub mod watcher;
pub mod worker;

pub use cache::{CacheError, StateCache};
pub use contract::{ContractClient, ContractError, TxWaiter};
pub use queue::{EventQueue, QueueError};
pub use relay::{RelayClient, RelayError, TaskArgs};
pub use watcher::{EventCallback, Watcher, WatchId, WatcherError};
pub use worker::{hash_artifact, Worker, WorkerError, WorkerOutcome};

#[cfg(any(test, feature = "test-support"))]
pub use cache::FakeStateCache;
#[cfg(any(test, feature = "test-support"))]
pub use contract::{ContractCall, FakeContractClient, FakeTxWaiter};
#[cfg(any(test, feature = "test-support"))]
pub use queue::FakeEventQueue;
#[cfg(any(test, feature = "test-support"))]
pub use relay::{FakeRelayClient, RelayCall};
#[cfg(any(test, feature = "test-support"))]
pub use watcher::{FakeWatcher, WatchCall};
#[cfg(any(test, feature = "test-support"))]
pub use worker::{FakeWorker, WorkerCall};

pub use cache::FileStateCache;
pub use relay::HttpRelayClient;
