//! SQL query implementations.

pub mod documents;

pub use documents::{find_by_keys, upsert_many};
