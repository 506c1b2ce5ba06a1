//! Workspace state.
//!
//! Persistent storage for the objects a workspace manages: one JSON document
//! per workspace, guarded by a lock file.

mod store;
mod local;
mod lock;
mod types;

pub use store::StateStore;
#[cfg(test)]
pub use store::MockStateStore;
pub use local::LocalStateStore;
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
pub use types::{HistoryEntry, Operation, ResourceState, WorkspaceState, STATE_VERSION};
