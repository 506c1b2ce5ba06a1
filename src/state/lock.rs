//! State locking.
//!
//! One writer per workspace: plan, apply, refresh and import all hold the
//! lock for the duration of the run. A lock that outlives its expiry is
//! considered abandoned and may be taken over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// Information about a state lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// Operation the lock was taken for.
    #[serde(default)]
    pub operation: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock info.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            operation: String::new(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Records the operation the lock is taken for.
    #[must_use]
    pub fn for_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Refreshes the lock expiry time.
    pub fn refresh(&mut self) {
        self.expires_at = Utc::now() + chrono::Duration::seconds(LOCK_EXPIRY_SECS);
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_creation() {
        let lock = LockInfo::new("test-holder").for_operation("apply");
        assert_eq!(lock.holder, "test-holder");
        assert_eq!(lock.operation, "apply");
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() > 0);
    }

    #[test]
    fn test_expired_lock() {
        let mut lock = LockInfo::new("test-holder");
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(lock.is_expired());
        assert_eq!(lock.remaining_secs(), 0);

        lock.refresh();
        assert!(!lock.is_expired());
    }

    #[test]
    fn test_holder_id_generation() {
        let id1 = generate_holder_id();
        let id2 = generate_holder_id();
        assert_ne!(id1, id2);

        let pid = std::process::id().to_string();
        assert!(id1.contains(&pid));
    }
}
