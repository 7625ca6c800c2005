// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! At-least-once event delivery with explicit ack/no-ack.

use async_trait::async_trait;
use taskd_core::{AckId, TaskEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown ack id: {0}")]
    UnknownAck(AckId),
    #[error("queue closed")]
    Closed,
}

/// Durable, at-least-once delivery of task events.
///
/// `recv` blocks while empty. `ack` commits consumption of a delivery;
/// `no_ack` releases it for redelivery, used by drain logic on a
/// non-terminal exit.
#[async_trait]
pub trait EventQueue: Send + Sync + 'static {
    async fn put(&self, event: TaskEvent) -> Result<(), QueueError>;
    async fn recv(&self) -> Result<(AckId, TaskEvent), QueueError>;
    async fn ack(&self, ack_id: AckId) -> Result<(), QueueError>;
    async fn no_ack(&self, ack_id: AckId) -> Result<(), QueueError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct FakeQueueState {
        pending: VecDeque<(AckId, TaskEvent)>,
        outstanding: HashMap<AckId, TaskEvent>,
        next_ack: AtomicU64,
    }

    /// In-memory `EventQueue` for tests. Redelivers `no_ack`ed events at the
    /// back of the pending buffer, mirroring at-least-once semantics.
    #[derive(Clone)]
    pub struct FakeEventQueue {
        state: Arc<Mutex<FakeQueueState>>,
        notify: Arc<Notify>,
    }

    impl Default for FakeEventQueue {
        fn default() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeQueueState {
                    pending: VecDeque::new(),
                    outstanding: HashMap::new(),
                    next_ack: AtomicU64::new(1),
                })),
                notify: Arc::new(Notify::new()),
            }
        }
    }

    impl FakeEventQueue {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of events neither delivered nor acked/no-acked.
        pub fn pending_len(&self) -> usize {
            self.state.lock().pending.len()
        }

        /// Ack ids delivered but not yet acked or no-acked.
        pub fn outstanding_acks(&self) -> Vec<AckId> {
            self.state.lock().outstanding.keys().copied().collect()
        }
    }

    #[async_trait]
    impl EventQueue for FakeEventQueue {
        async fn put(&self, event: TaskEvent) -> Result<(), QueueError> {
            let mut state = self.state.lock();
            let ack_id = AckId::from(state.next_ack.fetch_add(1, Ordering::SeqCst));
            state.pending.push_back((ack_id, event));
            drop(state);
            self.notify.notify_one();
            Ok(())
        }

        async fn recv(&self) -> Result<(AckId, TaskEvent), QueueError> {
            loop {
                {
                    let mut state = self.state.lock();
                    if let Some((ack_id, event)) = state.pending.pop_front() {
                        state.outstanding.insert(ack_id, event.clone());
                        return Ok((ack_id, event));
                    }
                }
                self.notify.notified().await;
            }
        }

        async fn ack(&self, ack_id: AckId) -> Result<(), QueueError> {
            let mut state = self.state.lock();
            state
                .outstanding
                .remove(&ack_id)
                .map(|_| ())
                .ok_or(QueueError::UnknownAck(ack_id))
        }

        async fn no_ack(&self, ack_id: AckId) -> Result<(), QueueError> {
            let mut state = self.state.lock();
            let event = state
                .outstanding
                .remove(&ack_id)
                .ok_or(QueueError::UnknownAck(ack_id))?;
            state.pending.push_back((ack_id, event));
            drop(state);
            self.notify.notify_one();
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "queue_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEventQueue;
