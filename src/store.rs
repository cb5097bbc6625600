//! Persistence for mention records and weekly snapshots.
//!
//! The [`Store`] trait is a whole-document load/save pair. Every operation
//! loads a fresh [`StoreState`], mutates it in memory, and saves it back
//! once, so there is no cache that can drift from disk.
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`JsonFileStore`] | Single JSON document on disk, replaced atomically |
//! | [`InMemoryStore`] | Tests and dry runs |
//!
//! Loading never fails: a missing file is the empty state, and a corrupt
//! file is logged and treated as empty. Saving returns an error and leaves
//! the caller to decide whether the cycle continues.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::StoreState;

/// Whole-document storage backend.
pub trait Store: Send + Sync {
    /// Load the current state, falling back to the empty state.
    fn load(&self) -> StoreState;

    /// Replace the stored state with `state`.
    fn save(&self, state: &StoreState) -> Result<()>;
}

/// JSON-file store at a configured path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> StoreState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "store file absent, starting empty");
                return StoreState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read store, starting empty");
                return StoreState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "malformed store file, starting empty");
                StoreState::default()
            }
        }
    }

    fn save(&self, state: &StoreState) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write store file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests.
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn load(&self) -> StoreState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, state: &StoreState) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        *guard = state.clone();
        Ok(())
    }
}

/// Save `state`, logging instead of propagating a failure.
///
/// Returns whether the write reached the backend.
pub fn persist(store: &dyn Store, state: &StoreState) -> bool {
    match store.save(state) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "failed to persist store; changes from this cycle are lost");
            false
        }
    }
}
