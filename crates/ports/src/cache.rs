// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key/value storage for per-task state.

use async_trait::async_trait;
use taskd_core::{TaskId, TaskState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no state recorded for task {0}")]
    NotFound(TaskId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable storage for `TaskState`, keyed by `task_id`.
///
/// `dump` must be atomic and durable on return: a concurrent crash must
/// never observe a partially-written record.
#[async_trait]
pub trait StateCache: Send + Sync + 'static {
    async fn has(&self, task_id: TaskId) -> Result<bool, CacheError>;
    async fn load(&self, task_id: TaskId) -> Result<TaskState, CacheError>;
    async fn dump(&self, state: &TaskState) -> Result<(), CacheError>;
}

/// One JSON file per task, written via temp-file-then-rename so a crash
/// mid-write never leaves a torn record behind.
pub struct FileStateCache {
    dir: std::path::PathBuf,
}

impl FileStateCache {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, task_id: TaskId) -> std::path::PathBuf {
        self.dir.join(format!("{}.json", task_id.get()))
    }
}

#[async_trait]
impl StateCache for FileStateCache {
    async fn has(&self, task_id: TaskId) -> Result<bool, CacheError> {
        let path = self.path_for(task_id);
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn load(&self, task_id: TaskId) -> Result<TaskState, CacheError> {
        let path = self.path_for(task_id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| CacheError::NotFound(task_id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn dump(&self, state: &TaskState) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(state.task_id);
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;

        let file = tokio::fs::File::create(&tmp_path).await?;
        {
            use tokio::io::AsyncWriteExt;
            let mut file = file;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeStateCacheInner {
        states: HashMap<TaskId, TaskState>,
        dump_calls: usize,
    }

    /// In-memory `StateCache` for tests.
    #[derive(Clone, Default)]
    pub struct FakeStateCache {
        inner: Arc<Mutex<FakeStateCacheInner>>,
    }

    impl FakeStateCache {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `dump` calls observed so far, to assert persistence
        /// happened without inspecting the stored value.
        pub fn dump_count(&self) -> usize {
            self.inner.lock().dump_calls
        }

        pub fn peek(&self, task_id: TaskId) -> Option<TaskState> {
            self.inner.lock().states.get(&task_id).cloned()
        }
    }

    #[async_trait]
    impl StateCache for FakeStateCache {
        async fn has(&self, task_id: TaskId) -> Result<bool, CacheError> {
            Ok(self.inner.lock().states.contains_key(&task_id))
        }

        async fn load(&self, task_id: TaskId) -> Result<TaskState, CacheError> {
            self.inner
                .lock()
                .states
                .get(&task_id)
                .cloned()
                .ok_or(CacheError::NotFound(task_id))
        }

        async fn dump(&self, state: &TaskState) -> Result<(), CacheError> {
            let mut inner = self.inner.lock();
            inner.states.insert(state.task_id, state.clone());
            inner.dump_calls += 1;
            Ok(())
        }
    }

    #[cfg(test)]
    #[path = "cache_fake_tests.rs"]
    mod tests;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStateCache;

#[cfg(test)]
#[path = "cache_file_tests.rs"]
mod file_tests;
