//! Fallback storage for the last good category list.
//!
//! The snapshot is written after every successful fetch and read only when a
//! fetch fails. Every operation is best-effort: failures are logged inside the
//! store and never reach the caller.

pub mod file;
pub mod memory;
pub mod snapshot;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::{age_display, CategorySnapshot};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait FallbackStore: Send + Sync {
    fn save(&self, snapshot: &CategorySnapshot);

    fn load(&self) -> Option<CategorySnapshot>;

    /// Drop the session snapshot.
    fn clear(&self);

    /// User-triggered cache clear: the session snapshot plus anything
    /// longer-lived the store keeps for categories.
    fn purge(&self) {
        self.clear();
    }

    /// The session is over; release whatever only it used.
    fn end_session(&self) {}
}
