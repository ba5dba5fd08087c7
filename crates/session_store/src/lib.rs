//! Persistence for conversation snapshots.
//!
//! A snapshot is a JSON array of `{role, content, timestamp}` records in
//! conversation order. Saving replaces the whole file atomically; loading
//! validates every record and reports failures by array index.

mod error;
mod paths;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use paths::{default_history_path, history_root, HISTORY_DIR, HISTORY_FILE_NAME};
pub use schema::{now_rfc3339, SnapshotRecord};
pub use store::SessionStore;
