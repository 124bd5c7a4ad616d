//! In-memory document store backend for the zipsync server.
//!
//! This crate provides an in-memory implementation of the `DocumentStore`
//! trait from `zipsync-storage`, using a papaya lock-free HashMap for
//! concurrent access. It backs `storage.backend = "memory"` and the test
//! suites; contents are lost when the process exits.
//!
//! # Example
//!
//! ```ignore
//! use zipsync_db_memory::InMemoryStore;
//! use zipsync_storage::DocumentStore;
//!
//! let store = InMemoryStore::new();
//! let found = store.find_by_keys("Products", "Zip", &["10001".into()]).await?;
//! ```

mod storage;

pub use storage::{InMemoryStore, StorageKey};

// Re-export the DocumentStore trait for convenience
pub use zipsync_storage::{DocumentStore, StorageError};

/// Type alias for a shareable in-memory store instance.
pub type DynInMemoryStore = std::sync::Arc<InMemoryStore>;

/// Creates a new in-memory store behind a shareable trait object.
pub fn create_store() -> zipsync_storage::DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
