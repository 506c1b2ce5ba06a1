//! Local file-based state storage backend.
//!
//! State lives in one JSON file; the lock is a sibling file created
//! exclusively, so two processes cannot both take a fresh lock.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_STATE_DIR, DEFAULT_STATE_FILE};
use crate::error::{EngineError, Result, StateError};

use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::{WorkspaceState, STATE_VERSION};

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a new local state store under the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| EngineError::internal(format!("Cannot determine current directory: {e}")))?
            .join(DEFAULT_STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a new local state store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(DEFAULT_STATE_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Creates a new local state store from a custom state file path.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let lock_path = state_path.with_extension("lock");

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                EngineError::State(StateError::write_failed(format!(
                    "Failed to create state directory: {e}"
                )))
            })?;
        }
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EngineError::State(StateError::corrupted(format!(
                    "Failed to read lock file: {e}"
                ))));
            }
        };

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            EngineError::State(StateError::corrupted(format!("Failed to parse lock file: {e}")))
        })?;

        Ok(Some(lock_info))
    }

    /// Writes the lock file. With `exclusive`, fails if one already exists.
    async fn write_lock_file(&self, lock_info: &LockInfo, exclusive: bool) -> Result<bool> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info).map_err(|e| {
            EngineError::State(StateError::serialization(format!("Failed to serialize lock: {e}")))
        })?;

        let mut options = fs::OpenOptions::new();
        options.write(true);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }

        let mut file = match options.open(&self.lock_path).await {
            Ok(file) => file,
            Err(e) if exclusive && e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(EngineError::State(StateError::LockFailed {
                    message: format!("Failed to create lock file: {e}"),
                }));
            }
        };

        file.write_all(content.as_bytes()).await.map_err(|e| {
            EngineError::State(StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })
        })?;

        file.sync_all().await.map_err(|e| {
            EngineError::State(StateError::LockFailed {
                message: format!("Failed to sync lock file: {e}"),
            })
        })?;

        Ok(true)
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::State(StateError::LockFailed {
                message: format!("Failed to delete lock file: {e}"),
            })),
        }
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<WorkspaceState>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path).await.map_err(|e| {
            EngineError::State(StateError::corrupted(format!("Failed to read state file: {e}")))
        })?;

        let state: WorkspaceState = serde_json::from_str(&content).map_err(|e| {
            EngineError::State(StateError::corrupted(format!("Failed to parse state file: {e}")))
        })?;

        if state.version != STATE_VERSION {
            return Err(EngineError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version,
            }));
        }

        Ok(Some(state))
    }

    async fn save(&self, state: &WorkspaceState, base_serial: u64) -> Result<()> {
        let stored = self.load().await?.map_or(0, |s| s.serial);
        if stored != base_serial || state.serial < base_serial {
            warn!(base_serial, stored, serial = state.serial, "Refusing to overwrite newer state");
            return Err(EngineError::State(StateError::StaleState {
                base: base_serial,
                stored,
            }));
        }

        self.ensure_dir().await?;

        info!(serial = state.serial, "Saving state to: {}", self.state_path.display());

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            EngineError::State(StateError::serialization(format!("Failed to serialize state: {e}")))
        })?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            EngineError::State(StateError::write_failed(format!(
                "Failed to create temp state file: {e}"
            )))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            EngineError::State(StateError::write_failed(format!("Failed to write state file: {e}")))
        })?;

        file.sync_all().await.map_err(|e| {
            EngineError::State(StateError::write_failed(format!("Failed to sync state file: {e}")))
        })?;

        fs::rename(&temp_path, &self.state_path).await.map_err(|e| {
            EngineError::State(StateError::write_failed(format!("Failed to rename state file: {e}")))
        })?;

        debug!("State saved successfully");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path).await.map_err(|e| {
                EngineError::State(StateError::write_failed(format!(
                    "Failed to delete state file: {e}"
                )))
            })?;
        }

        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn lock(&self, operation: &str) -> Result<LockInfo> {
        let lock_info = LockInfo::new(&generate_holder_id()).for_operation(operation);

        if !self.write_lock_file(&lock_info, true).await? {
            match self.read_lock_file().await? {
                Some(existing) if !existing.is_expired() => {
                    return Err(EngineError::State(StateError::LockedByOther {
                        holder: existing.holder.clone(),
                        since: existing.acquired_at.to_rfc3339(),
                    }));
                }
                _ => {
                    warn!("Expired state lock found, taking over");
                    self.write_lock_file(&lock_info, false).await?;
                }
            }
        }

        info!(
            "Acquired state lock: {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    async fn unlock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                info!("Released state lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn current_lock(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Operation, ResourceState};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalStateStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStateStore::with_base_dir(temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store();

        let mut state = WorkspaceState::new("demo");
        state.set(ResourceState::new("local_file", "a", 1, json!({"id": "a.txt"})));
        state.record(Operation::Apply, vec!["local_file.a".to_string()], None);
        store.save(&state, 0).await.expect("Failed to save state");

        let loaded = store
            .load()
            .await
            .expect("Failed to load state")
            .expect("State should exist");

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();

        let result = store.load().await.expect("Load should not fail");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let (store, temp) = create_test_store();
        let mut state = WorkspaceState::new("demo");
        state.version = "0".to_string();
        std::fs::write(
            temp.path().join(DEFAULT_STATE_FILE),
            serde_json::to_string(&state).expect("json"),
        )
        .expect("write");

        let err = store.load().await.expect_err("old version");
        assert!(matches!(err, EngineError::State(StateError::VersionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (store, _temp) = create_test_store();

        assert!(!store.exists().await.expect("exists check failed"));
        store.save(&WorkspaceState::new("demo"), 0).await.expect("Failed to save state");
        assert!(store.exists().await.expect("exists check failed"));

        store.delete().await.expect("delete");
        assert!(!store.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_stale_save_is_refused() {
        let (store, _temp) = create_test_store();

        let mut first = WorkspaceState::new("demo");
        first.record(Operation::Apply, Vec::new(), None);
        store.save(&first, 0).await.expect("first save");

        // A second writer that also started from an empty store.
        let mut second = WorkspaceState::new("demo");
        second.record(Operation::Refresh, Vec::new(), None);
        let err = store.save(&second, 0).await.expect_err("stale");
        assert!(matches!(
            err,
            EngineError::State(StateError::StaleState { base: 0, stored: 1 })
        ));

        let mut next = store.load().await.expect("load").expect("stored");
        next.record(Operation::Refresh, Vec::new(), None);
        store.save(&next, 1).await.expect("derived from the stored serial");
        assert_eq!(store.load().await.expect("load").map(|s| s.serial), Some(2));
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let (store, _temp) = create_test_store();

        let lock = store.lock("apply").await.expect("Failed to acquire lock");

        assert!(store.is_locked().await.expect("is_locked failed"));
        let info = store.current_lock().await.expect("info").expect("locked");
        assert_eq!(info.operation, "apply");
        assert_eq!(info.lock_id, lock.lock_id);
        assert!(info.holder.contains(&std::process::id().to_string()));

        store.unlock("someone-else").await.expect("mismatch is ignored");
        assert!(store.is_locked().await.expect("is_locked failed"));

        store.unlock(&lock.lock_id).await.expect("Failed to release lock");
        assert!(!store.is_locked().await.expect("is_locked failed"));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = create_test_store();

        let _lock1 = store.lock("plan").await.expect("Failed to acquire first lock");

        let result = store.lock("plan").await;
        assert!(matches!(result, Err(EngineError::State(StateError::LockedByOther { .. }))));
    }

    #[tokio::test]
    async fn test_expired_lock_taken_over() {
        let (store, temp) = create_test_store();
        let mut stale = LockInfo::new("gone");
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        std::fs::write(
            temp.path().join(LOCK_FILE),
            serde_json::to_string(&stale).expect("json"),
        )
        .expect("write");

        let lock = store.lock("apply").await.expect("takeover");
        assert_ne!(lock.holder, "gone");
        assert_ne!(lock.lock_id, stale.lock_id);
    }
}
