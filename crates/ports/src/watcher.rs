// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chain-log subscriber that filters contract events by task id.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("subscription failed: {0}")]
    SubscribeFailed(String),
    #[error("unknown watch id: {0}")]
    UnknownWatch(WatchId),
}

/// Opaque handle to an active subscription, returned by `watch_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Invoked with raw chain event data whenever a watched log matches; the
/// runner is responsible for translating this into a `TaskEvent` and
/// pushing it to the event queue.
pub type EventCallback = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Subscribes to filtered contract events and notifies a callback.
#[async_trait]
pub trait Watcher: Send + Sync + 'static {
    async fn watch_event(
        &self,
        contract: &str,
        event_name: &str,
        callback: EventCallback,
        filter_args: serde_json::Value,
    ) -> Result<WatchId, WatcherError>;

    async fn unwatch_event(&self, watch_id: WatchId) -> Result<(), WatcherError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct WatchCall {
        pub contract: String,
        pub event_name: String,
        pub filter_args: serde_json::Value,
    }

    #[derive(Default)]
    struct FakeWatcherState {
        watches: Vec<(WatchId, WatchCall)>,
        unwatched: Vec<WatchId>,
        next_id: u64,
    }

    /// In-memory `Watcher` for tests; records subscriptions and
    /// unsubscriptions instead of talking to a chain.
    #[derive(Clone, Default)]
    pub struct FakeWatcher {
        state: std::sync::Arc<Mutex<FakeWatcherState>>,
    }

    impl FakeWatcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn active_watches(&self) -> Vec<WatchCall> {
            let state = self.state.lock();
            state
                .watches
                .iter()
                .filter(|(id, _)| !state.unwatched.contains(id))
                .map(|(_, call)| call.clone())
                .collect()
        }

        pub fn unwatched_count(&self) -> usize {
            self.state.lock().unwatched.len()
        }
    }

    #[async_trait]
    impl Watcher for FakeWatcher {
        async fn watch_event(
            &self,
            contract: &str,
            event_name: &str,
            _callback: EventCallback,
            filter_args: serde_json::Value,
        ) -> Result<WatchId, WatcherError> {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = WatchId(state.next_id);
            state.watches.push((
                id,
                WatchCall {
                    contract: contract.to_string(),
                    event_name: event_name.to_string(),
                    filter_args,
                },
            ));
            Ok(id)
        }

        async fn unwatch_event(&self, watch_id: WatchId) -> Result<(), WatcherError> {
            let mut state = self.state.lock();
            if !state.watches.iter().any(|(id, _)| *id == watch_id) {
                return Err(WatcherError::UnknownWatch(watch_id));
            }
            state.unwatched.push(watch_id);
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "watcher_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWatcher, WatchCall};
