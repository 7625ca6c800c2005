// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent contract-call submission: survives a crash between
//! submitting a transaction and observing its receipt.

use super::TaskRunner;
use crate::error::TaskError;
use std::future::Future;
use std::pin::Pin;
use taskd_core::{Clock, ContractMethod, PendingTx, TxHash};
use taskd_ports::{ContractError, TxWaiter};

type SubmitFuture = Pin<Box<dyn Future<Output = Result<(TxHash, Box<dyn TxWaiter>), ContractError>> + Send>>;

impl<C: Clock> TaskRunner<C> {
    /// Drives one contract call through the submit-or-resume pattern:
    ///
    /// 1. No pending tx for this method: submit, persist `(method, hash)`,
    ///    then await the receipt.
    /// 2. A pending tx for this exact method: rebuild a waiter from the
    ///    stored hash and await it, without resubmitting.
    /// 3. A pending tx for a different method: the state is inconsistent.
    ///
    /// On receipt (success or revert) the pending-tx fields are cleared.
    pub(crate) async fn run_coordinated(
        &self,
        method: ContractMethod,
        submit: impl FnOnce() -> SubmitFuture,
    ) -> Result<(), TaskError> {
        let pending = self.state.lock().waiting_tx.clone();

        let waiter: Box<dyn TxWaiter> = match pending {
            Some(PendingTx { method: found, tx_hash }) if found == method => {
                self.deps.contract.resume(method, tx_hash).await?
            }
            Some(PendingTx { method: found, .. }) => {
                return Err(TaskError::InconsistentPendingTx {
                    expected: method,
                    found,
                });
            }
            None => {
                let (tx_hash, waiter) = submit().await?;
                self.state_context(|s| {
                    s.waiting_tx = Some(PendingTx { method, tx_hash });
                })
                .await?;
                waiter
            }
        };

        let outcome = waiter.wait().await;
        self.state_context(|s| s.waiting_tx = None).await?;
        outcome.map_err(TaskError::from)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
