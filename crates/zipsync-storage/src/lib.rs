//! # zipsync-storage
//!
//! Storage abstraction layer for the zipsync server.
//!
//! This crate defines the trait and types that every document store backend
//! implements. It contains no backend itself; those live in
//! `zipsync-db-memory` and `zipsync-db-postgres`.
//!
//! ## Overview
//!
//! The main trait is [`DocumentStore`], a keyed collection store with two
//! batched operations:
//! - [`DocumentStore::find_by_keys`]: fetch every document whose key field
//!   matches one of the given keys
//! - [`DocumentStore::bulk_upsert`]: apply an ordered batch of
//!   [`WriteOperation`]s, each "match by key, set fields, insert if absent"
//!
//! ## Example
//!
//! ```ignore
//! use zipsync_storage::{DocumentStore, StorageError, WriteOperation};
//!
//! async fn rename(store: &dyn DocumentStore) -> Result<(), StorageError> {
//!     let mut set = zipsync_storage::Document::new();
//!     set.insert("Zip".into(), "10001".into());
//!     set.insert("Product".into(), "Widget".into());
//!
//!     store
//!         .bulk_upsert("Products", &[WriteOperation::upsert("Zip", "10001", set)])
//!         .await?;
//!     Ok(())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::DocumentStore;
pub use types::{BulkWriteResult, Document, WriteOperation};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable store trait object.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use zipsync_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::DocumentStore;
    pub use crate::types::{BulkWriteResult, Document, WriteOperation};
    pub use crate::{DynStore, StorageResult};
}
