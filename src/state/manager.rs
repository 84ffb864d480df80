//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::RunState;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager for loading and persisting run state
///
/// Cheap to clone; clones share the underlying state. The engine writes
/// bookmarks through the manager and snapshots it whenever a STATE
/// message goes out.
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file, if persisting
    path: Option<PathBuf>,
    /// Current state
    state: Arc<RwLock<RunState>>,
}

impl StateManager {
    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(RunState::new())),
        }
    }

    /// Create a state manager that persists to `path`, starting empty
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            state: Arc::new(RwLock::new(RunState::new())),
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;
            serde_json::from_str(&contents).map_err(|e| Error::State {
                message: format!("Failed to parse state file: {e}"),
            })?
        } else {
            RunState::new()
        };

        Ok(Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory state manager from inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let state: RunState = serde_json::from_str(json).map_err(|e| Error::State {
            message: format!("Failed to parse state JSON: {e}"),
        })?;

        Ok(Self {
            path: None,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Clone the current state
    pub async fn snapshot(&self) -> RunState {
        self.state.read().await.clone()
    }

    /// Save current state to the backing file (no-op when in-memory)
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let state = self.state.read().await;
        let contents = serde_json::to_string_pretty(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })?;
        drop(state);

        // Write to temp file first, then rename for atomicity.
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to write state file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to rename state file: {e}"),
            })?;

        Ok(())
    }

    /// Get the bookmark for a stream, falling back to `default`
    pub async fn get_bookmark(&self, stream: &str, default: &str) -> String {
        self.state.read().await.get_bookmark(stream, default)
    }

    /// Advance a bookmark, keeping the larger of old and new
    pub async fn update_bookmark(&self, stream: &str, value: &str) {
        self.state.write().await.update_bookmark(stream, value);
    }

    /// Overwrite a bookmark unconditionally
    pub async fn set_bookmark(&self, stream: &str, value: impl Into<String>) {
        self.state.write().await.set_bookmark(stream, value);
    }

    /// Get the interrupted-run marker
    pub async fn currently_syncing(&self) -> Option<String> {
        self.state
            .read()
            .await
            .currently_syncing()
            .map(str::to_string)
    }

    /// Set or clear the interrupted-run marker
    pub async fn set_currently_syncing(&self, stream: Option<&str>) {
        self.state.write().await.set_currently_syncing(stream);
    }

    /// Get a write lock on the current state
    pub async fn state_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, RunState> {
        self.state.write().await
    }

    /// Get the state file path, if persisting
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
        }
    }
}
