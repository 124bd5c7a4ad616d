//! Storage types for the document store abstraction layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: a flat JSON object carrying its key field.
///
/// Backends never include their own identity columns in it.
pub type Document = serde_json::Map<String, Value>;

/// An upsert instruction: match the document whose `key_field` equals
/// `key`, set every field of `set` on it, insert `set` if no document matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOperation {
    /// Name of the field the match is made on.
    pub key_field: String,
    /// Key value to match.
    pub key: String,
    /// Fields to set. Always contains `key_field`.
    pub set: Document,
}

impl WriteOperation {
    /// Creates an upsert keyed by `key_field = key`.
    ///
    /// The key field is written into `set` so an inserted document is
    /// always findable by its key.
    #[must_use]
    pub fn upsert(key_field: impl Into<String>, key: impl Into<String>, mut set: Document) -> Self {
        let key_field = key_field.into();
        let key = key.into();
        set.insert(key_field.clone(), Value::String(key.clone()));
        Self {
            key_field,
            key,
            set,
        }
    }

    /// Applies this operation's `$set` on top of an existing document.
    pub fn apply_to(&self, existing: &mut Document) {
        for (field, value) in &self.set {
            existing.insert(field.clone(), value.clone());
        }
    }
}

/// Outcome counters of a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteResult {
    /// Operations that matched an existing document.
    pub matched: usize,
    /// Operations that inserted a new document.
    pub upserted: usize,
}

impl BulkWriteResult {
    /// Total number of operations applied.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matched + self.upserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_writes_key_into_set() {
        let op = WriteOperation::upsert("Zip", "10001", Document::new());
        assert_eq!(op.set.get("Zip"), Some(&json!("10001")));
        assert_eq!(op.key_field, "Zip");
    }

    #[test]
    fn apply_to_overwrites_and_keeps_unrelated_fields() {
        let mut existing = json!({"Zip": "10001", "Product": "Old", "Extra": "kept"})
            .as_object()
            .cloned()
            .unwrap();
        let set = json!({"Product": "Widget"}).as_object().cloned().unwrap();
        WriteOperation::upsert("Zip", "10001", set).apply_to(&mut existing);

        assert_eq!(existing["Product"], json!("Widget"));
        assert_eq!(existing["Extra"], json!("kept"));
    }
}
