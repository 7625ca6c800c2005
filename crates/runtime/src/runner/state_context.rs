// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped state mutation: every exit persists the new state durably and
//! notifies status-waiters only once persistence has succeeded.

use super::TaskRunner;
use crate::error::TaskError;
use std::time::Duration;
use taskd_core::{Clock, TaskState};

const PERSIST_BUDGET: Duration = Duration::from_secs(10);

impl<C: Clock> TaskRunner<C> {
    /// Applies `mutate` to the in-memory state, then persists the result
    /// under a shielded budget so a cancelled caller can't abort a
    /// half-written record, and finally notifies status-waiters.
    ///
    /// This is the only place state is persisted during normal operation;
    /// any field change outside this scope is a bug.
    pub(crate) async fn state_context<F>(&self, mutate: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut TaskState),
    {
        let new_state = {
            let mut guard = self.state.lock();
            mutate(&mut guard);
            guard.clone()
        };

        let cache = self.deps.cache.clone();
        let to_persist = new_state.clone();
        let persist = tokio::spawn(async move { cache.dump(&to_persist).await });

        let outcome = tokio::time::timeout(PERSIST_BUDGET, persist)
            .await
            .map_err(|_| TaskError::PersistTimedOut)?;
        let result = outcome.map_err(|e| TaskError::Internal(e.to_string()))?;
        result?;

        // Waiters only learn about the new status once it is durable.
        let _ = self.status_tx.send(new_state.status);
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_context_tests.rs"]
mod tests;
