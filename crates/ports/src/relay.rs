// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Off-chain HTTP service holding task inputs and accepting final
//! artifacts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use taskd_core::TaskId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The task isn't registered with the relay yet; retried by the
    /// caller's backoff loop.
    #[error("task not found: {0}")]
    NotFound(String),
    /// The task exists but its inputs aren't staged yet; retried.
    #[error("task not ready: {0}")]
    NotReady(String),
    #[error("relay request failed: {0}")]
    Other(String),
}

impl RelayError {
    /// Whether the handler's bounded backoff loop should retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::NotFound(_) | RelayError::NotReady(_))
    }
}

/// Task input fetched from the relay. The payload shape is opaque to the
/// runner; it is handed to the worker unexamined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    pub task_id: TaskId,
    pub payload: serde_json::Value,
}

/// Fetches task inputs and uploads final result artifacts.
#[async_trait]
pub trait RelayClient: Send + Sync + 'static {
    async fn get_task(&self, task_id: TaskId) -> Result<TaskArgs, RelayError>;
    async fn upload_task_result(
        &self,
        task_id: TaskId,
        files: &[PathBuf],
    ) -> Result<(), RelayError>;
}

/// `reqwest`-backed `RelayClient`.
pub struct HttpRelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> RelayError {
        match status.as_u16() {
            404 => RelayError::NotFound(body),
            409 => RelayError::NotReady(body),
            _ => RelayError::Other(format!("status {status}: {body}")),
        }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn get_task(&self, task_id: TaskId) -> Result<TaskArgs, RelayError> {
        let url = format!("{}/tasks/{}", self.base_url, task_id.get());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Other(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        response
            .json::<TaskArgs>()
            .await
            .map_err(|e| RelayError::Other(e.to_string()))
    }

    async fn upload_task_result(
        &self,
        task_id: TaskId,
        files: &[PathBuf],
    ) -> Result<(), RelayError> {
        let url = format!("{}/tasks/{}/result", self.base_url, task_id.get());

        let mut form = reqwest::multipart::Form::new();
        for path in files {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| RelayError::Other(format!("reading {}: {e}", path.display())))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            form = form.part(file_name.clone(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Other(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RelayCall {
        GetTask(TaskId),
        Upload { task_id: TaskId, files: Vec<PathBuf> },
    }

    #[derive(Default)]
    struct FakeRelayState {
        tasks: HashMap<TaskId, TaskArgs>,
        /// Errors to hand back for the next N `get_task` calls for a task,
        /// simulating "not ready yet" before the real args appear.
        pending_errors: HashMap<TaskId, Vec<RelayError>>,
        calls: Vec<RelayCall>,
    }

    /// In-memory `RelayClient` for tests.
    #[derive(Clone, Default)]
    pub struct FakeRelayClient {
        state: Arc<Mutex<FakeRelayState>>,
    }

    impl FakeRelayClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_task(&self, args: TaskArgs) {
            self.state.lock().tasks.insert(args.task_id, args);
        }

        /// Queues errors to return (in order) before `get_task` finally
        /// succeeds, for exercising the handler's retry loop.
        pub fn queue_errors(&self, task_id: TaskId, errors: Vec<RelayError>) {
            self.state.lock().pending_errors.insert(task_id, errors);
        }

        pub fn calls(&self) -> Vec<RelayCall> {
            self.state.lock().calls.clone()
        }
    }

    #[async_trait]
    impl RelayClient for FakeRelayClient {
        async fn get_task(&self, task_id: TaskId) -> Result<TaskArgs, RelayError> {
            let mut state = self.state.lock();
            state.calls.push(RelayCall::GetTask(task_id));

            if let Some(errors) = state.pending_errors.get_mut(&task_id) {
                if !errors.is_empty() {
                    return Err(errors.remove(0));
                }
            }
            state
                .tasks
                .get(&task_id)
                .cloned()
                .ok_or_else(|| RelayError::NotFound(task_id.to_string()))
        }

        async fn upload_task_result(
            &self,
            task_id: TaskId,
            files: &[PathBuf],
        ) -> Result<(), RelayError> {
            self.state.lock().calls.push(RelayCall::Upload {
                task_id,
                files: files.to_vec(),
            });
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "relay_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRelayClient, RelayCall};
