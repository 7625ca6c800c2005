// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task internal FIFO, fed by the dispatcher and consumed by the
//! runner one event at a time.

use taskd_core::{AckId, TaskEvent};
use tokio::sync::mpsc;

/// One buffered delivery. `ack_id` is `None` for self-generated events
/// (e.g. a locally produced `TaskResultReady`), which have no counterpart
/// in the external event queue and so need no ack/no-ack at drain time.
#[derive(Debug, Clone)]
pub struct IntakeItem {
    pub ack_id: Option<AckId>,
    pub event: TaskEvent,
}

/// Sending half, held by the dispatcher (and by handlers that
/// self-generate follow-up events).
#[derive(Clone)]
pub struct IntakeSender {
    tx: mpsc::UnboundedSender<IntakeItem>,
}

impl IntakeSender {
    pub fn send(&self, item: IntakeItem) -> Result<(), IntakeItem> {
        self.tx.send(item).map_err(|e| e.0)
    }
}

/// Receiving half, owned exclusively by the runner.
pub struct IntakeReceiver {
    rx: mpsc::UnboundedReceiver<IntakeItem>,
}

impl IntakeReceiver {
    pub async fn recv(&mut self) -> Option<IntakeItem> {
        self.rx.recv().await
    }

    /// Drains everything currently buffered without blocking, for the
    /// drain-on-exit pass.
    pub fn drain(&mut self) -> Vec<IntakeItem> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }
}

pub fn channel() -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IntakeSender { tx }, IntakeReceiver { rx })
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
