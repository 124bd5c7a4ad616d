//! Turns an uploaded table into the ordered upsert batch for one entity.
//!
//! The whole table is validated before anything is returned, so a caller
//! either gets every operation or none.

use serde_json::Value;
use zipsync_storage::{Document, WriteOperation};

use crate::entity::{EntityDefinition, FieldDefinition};
use crate::table::{Row, Table};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The table lacks the key column or a required field column.
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    /// A row meant to change data has an empty cell.
    #[error("Row with {key_field} {key} contains 'N/A' value")]
    IncompleteRow { key_field: String, key: String },
}

impl ReconcileError {
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MissingColumn(_))
    }
}

/// Fields of one row after spelling resolution. `None` means no accepted
/// spelling had a column, or the cell is missing.
#[derive(Debug)]
struct ResolvedRow<'a> {
    key: &'a str,
    fields: Vec<(&'a FieldDefinition, Option<&'a str>)>,
}

impl<'a> ResolvedRow<'a> {
    fn resolve(entity: &'a EntityDefinition, row: &Row<'a>) -> Self {
        // The key column was checked by the caller; a short row gives "".
        let key = row.raw(&entity.key_field).unwrap_or_default();
        let fields = entity
            .fields
            .iter()
            .map(|field| (field, resolve_field(field, row)))
            .collect();
        Self { key, fields }
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .find(|(field, _)| field.name == name)
            .and_then(|(_, value)| *value)
    }

    fn into_document(self) -> Option<Document> {
        let mut doc = Document::new();
        for (field, value) in self.fields {
            doc.insert(field.name.clone(), Value::String(value?.to_string()));
        }
        Some(doc)
    }
}

/// First spelling whose column exists decides the field; later spellings are
/// not consulted even if that cell is missing.
fn resolve_field<'a>(field: &FieldDefinition, row: &Row<'a>) -> Option<&'a str> {
    field
        .spellings()
        .find_map(|spelling| row.raw(spelling).map(|_| row.value(spelling)))
        .flatten()
}

/// Checks the header for the key column and every required field column.
fn check_columns(entity: &EntityDefinition, table: &Table) -> Result<(), ReconcileError> {
    if !table.has_column(&entity.key_field) {
        return Err(ReconcileError::MissingColumn(entity.key_field.clone()));
    }
    for field in entity.fields.iter().filter(|f| f.required_column) {
        if !field.spellings().any(|s| table.has_column(s)) {
            return Err(ReconcileError::MissingColumn(field.name.clone()));
        }
    }
    Ok(())
}

/// Builds the upsert batch for `table`, in row order.
///
/// Rows whose attribution field is absent or blank are skipped. Any other
/// row must be complete: every cell of the row and every field of the
/// entity must hold a value, otherwise the whole table is rejected naming
/// that row's key.
///
/// # Errors
///
/// `MissingColumn` for a header problem, `IncompleteRow` for the first
/// incomplete row.
pub fn reconcile(
    entity: &EntityDefinition,
    table: &Table,
) -> Result<Vec<WriteOperation>, ReconcileError> {
    check_columns(entity, table)?;

    let mut operations = Vec::with_capacity(table.len());
    for row in table.rows() {
        let resolved = ResolvedRow::resolve(entity, &row);

        let attributed = resolved
            .get(&entity.attribution_field)
            .is_some_and(|user| !user.trim().is_empty());
        if !attributed {
            tracing::trace!(key = resolved.key, "row skipped: no attribution");
            continue;
        }

        let key = resolved.key;
        let incomplete = || ReconcileError::IncompleteRow {
            key_field: entity.key_field.clone(),
            key: key.to_string(),
        };
        if row.has_missing_cell() {
            return Err(incomplete());
        }
        let set = resolved.into_document().ok_or_else(incomplete)?;

        operations.push(WriteOperation::upsert(&entity.key_field, key, set));
    }

    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(csv: &str) -> Table {
        Table::from_csv(csv.as_bytes()).expect("csv")
    }

    #[test]
    fn builds_upsert_with_canonical_names() {
        let t = table(
            "Zip,Product,Recorded,ORG_User,Modified_User\n10001,Widget,2024-01-01,alice,alice\n",
        );
        let ops = reconcile(&EntityDefinition::product(), &t).unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key, "10001");
        assert_eq!(
            Value::Object(ops[0].set.clone()),
            json!({
                "Zip": "10001",
                "Product": "Widget",
                "Recorded": "2024-01-01",
                "ORG User": "alice",
                "Modified User": "alice"
            })
        );
    }

    #[test]
    fn space_spelling_wins_over_underscore() {
        let t = table(
            "Zip,Product,Recorded,ORG User,ORG_User,Modified User,Modified_User\n\
             10001,Widget,2024,space-org,under-org,space-mod,under-mod\n",
        );
        let ops = reconcile(&EntityDefinition::product(), &t).unwrap();
        assert_eq!(ops[0].set["ORG User"], json!("space-org"));
        assert_eq!(ops[0].set["Modified User"], json!("space-mod"));
    }

    #[test]
    fn blank_or_whitespace_attribution_is_skipped() {
        let t = table(
            "Zip,Product,Recorded,ORG User,Modified User\n\
             10001,,,,\n\
             20002,Gadget,2024,bob,   \n\
             30003,Sprocket,2024,carol,N/A\n",
        );
        let ops = reconcile(&EntityDefinition::product(), &t).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn incomplete_attributed_row_names_its_key() {
        let t = table(
            "Zip,Product,Recorded,ORG User,Modified User\n\
             10001,Widget,2024,alice,alice\n\
             20002,Gadget,,bob,bob\n",
        );
        let err = reconcile(&EntityDefinition::product(), &t).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::IncompleteRow {
                key_field: "Zip".into(),
                key: "20002".into()
            }
        );
        assert_eq!(err.to_string(), "Row with Zip 20002 contains 'N/A' value");
    }

    #[test]
    fn unrelated_empty_column_fails_attributed_row() {
        let t = table(
            "Zip,Product,Recorded,ORG User,Modified User,Notes\n10001,Widget,2024,alice,alice,\n",
        );
        let err = reconcile(&EntityDefinition::product(), &t).unwrap_err();
        assert!(matches!(err, ReconcileError::IncompleteRow { ref key, .. } if key == "10001"));
    }

    #[test]
    fn empty_cell_under_repeated_header_fails_attributed_row() {
        let t = table(
            "Zip,Product,Recorded,ORG User,Modified User,Notes,Notes\n10001,Widget,2024,a,a,x,\n",
        );
        let err = reconcile(&EntityDefinition::product(), &t).unwrap_err();
        assert!(matches!(err, ReconcileError::IncompleteRow { ref key, .. } if key == "10001"));
    }

    #[test]
    fn absent_org_user_column_fails_attributed_row() {
        let t = table("Zip,Product,Recorded,Modified User\n10001,Widget,2024,alice\n");
        let err = reconcile(&EntityDefinition::product(), &t).unwrap_err();
        assert!(matches!(err, ReconcileError::IncompleteRow { .. }));
    }

    #[test]
    fn absent_attribution_column_skips_every_row() {
        let t = table("Zip,Product,Recorded,ORG User\n10001,Widget,2024,alice\n");
        assert!(reconcile(&EntityDefinition::product(), &t).unwrap().is_empty());
    }

    #[test]
    fn attribution_does_not_carry_over_between_rows() {
        let t = table(
            "Zip,Product,Recorded,ORG User,Modified User\n\
             10001,Widget,2024,alice,alice\n\
             20002,Gadget,2024,bob\n",
        );
        let ops = reconcile(&EntityDefinition::product(), &t).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key, "10001");
    }

    #[test]
    fn missing_key_or_required_column_is_malformed() {
        let no_key = table("Product,Recorded,Modified User\nWidget,2024,alice\n");
        let err = reconcile(&EntityDefinition::product(), &no_key).unwrap_err();
        assert_eq!(err, ReconcileError::MissingColumn("Zip".into()));
        assert!(err.is_malformed_input());

        let no_value = table("Zip,Recorded,ORG User,Modified User\n10001,2024,a,a\n");
        let err = reconcile(&EntityDefinition::product(), &no_value).unwrap_err();
        assert_eq!(err, ReconcileError::MissingColumn("Product".into()));
    }

    #[test]
    fn population_accepts_both_value_spellings_and_keeps_order() {
        let t = table(
            "Zip,5_Mile_Population,Recorded,ORG_User,Modified_User\n\
             30003,1200,2024,a,a\n\
             10001,800,2024,b,b\n\
             30003,1300,2024,c,c\n",
        );
        let ops = reconcile(&EntityDefinition::population(), &t).unwrap();
        let keys: Vec<_> = ops.iter().map(|op| op.key.as_str()).collect();
        assert_eq!(keys, ["30003", "10001", "30003"]);
        assert_eq!(ops[2].set["5 Mile Population"], json!("1300"));
    }
}
