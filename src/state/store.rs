//! State store trait definition.
//!
//! A store holds one workspace's state document plus its lock. Writes are
//! serial-checked: a caller saves state it derived from a particular stored
//! serial, and the store refuses the write if someone else moved it on.

use async_trait::async_trait;

use crate::error::Result;
use super::types::WorkspaceState;
use super::lock::LockInfo;

/// Trait for state storage backends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the workspace state.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<WorkspaceState>>;

    /// Saves `state`, which was derived from the stored state at
    /// `base_serial` (0 when nothing was stored).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::StaleState`](crate::error::StateError::StaleState)
    /// if the stored serial is no longer `base_serial`, or if `state.serial`
    /// is behind it.
    async fn save(&self, state: &WorkspaceState, base_serial: u64) -> Result<()>;

    /// Deletes the workspace state and any lock.
    async fn delete(&self) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Takes the workspace lock for `operation`. The holder is this host and
    /// process.
    async fn lock(&self, operation: &str) -> Result<LockInfo>;

    /// Releases the lock if `lock_id` still holds it.
    async fn unlock(&self, lock_id: &str) -> Result<()>;

    /// The lock currently on file, expired or not.
    async fn current_lock(&self) -> Result<Option<LockInfo>>;

    /// Checks if an unexpired lock is held.
    async fn is_locked(&self) -> Result<bool> {
        Ok(self.current_lock().await?.is_some_and(|lock| !lock.is_expired()))
    }
}
