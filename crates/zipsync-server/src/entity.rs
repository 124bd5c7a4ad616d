//! Entity definitions: which collection a route serves, which column is the
//! key, and which spellings each field may arrive under.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Value written into every non-key field of a placeholder record.
pub const PLACEHOLDER_VALUE: &str = "N/A";

/// One logical field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Canonical name, used when storing and when building placeholders.
    /// It is also the first accepted spelling.
    pub name: String,
    /// Further accepted column spellings, checked in order after `name`.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Whether an upload must carry a column for this field.
    #[serde(default)]
    pub required_column: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            required_column: false,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required_column = true;
        self
    }

    /// Accepted spellings in lookup order.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// A keyed collection exposed under `/{route}/download` and `/{route}/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Path segment, e.g. `product`.
    pub route: String,
    /// Store collection name, e.g. `Products`.
    pub collection: String,
    /// Key column and stored key field.
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Non-key fields in output order.
    pub fields: Vec<FieldDefinition>,
    /// Canonical name of the field naming the last modifier. Rows with it
    /// blank are skipped on upload.
    #[serde(default = "default_attribution_field")]
    pub attribution_field: String,
}

fn default_key_field() -> String {
    "Zip".into()
}
fn default_attribution_field() -> String {
    "Modified User".into()
}

impl EntityDefinition {
    /// Fields shared by every built-in entity, after its value field.
    fn standard_fields(value_field: FieldDefinition) -> Vec<FieldDefinition> {
        vec![
            value_field,
            FieldDefinition::new("Recorded").required(),
            FieldDefinition::new("ORG User").with_alias("ORG_User"),
            FieldDefinition::new("Modified User").with_alias("Modified_User"),
        ]
    }

    /// The `Products` collection.
    pub fn product() -> Self {
        Self {
            route: "product".into(),
            collection: "Products".into(),
            key_field: default_key_field(),
            fields: Self::standard_fields(FieldDefinition::new("Product").required()),
            attribution_field: default_attribution_field(),
        }
    }

    /// The `Populations` collection.
    pub fn population() -> Self {
        Self {
            route: "population".into(),
            collection: "Populations".into(),
            key_field: default_key_field(),
            fields: Self::standard_fields(
                FieldDefinition::new("5 Mile Population")
                    .with_alias("5_Mile_Population")
                    .required(),
            ),
            attribution_field: default_attribution_field(),
        }
    }

    /// Built-in entities served when configuration names none.
    pub fn defaults() -> Vec<Self> {
        vec![Self::product(), Self::population()]
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Record returned for a key absent from the store.
    pub fn placeholder(&self, key: &str) -> zipsync_storage::Document {
        let mut doc = zipsync_storage::Document::new();
        doc.insert(self.key_field.clone(), key.into());
        for field in &self.fields {
            doc.insert(field.name.clone(), PLACEHOLDER_VALUE.into());
        }
        doc
    }

    /// Checks the definition is usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.route.is_empty() || self.route.contains('/') {
            return Err(format!("entity route '{}' must be a single path segment", self.route));
        }
        if self.collection.is_empty() {
            return Err(format!("entity '{}' needs a collection", self.route));
        }
        if self.key_field.is_empty() {
            return Err(format!("entity '{}' needs a key_field", self.route));
        }
        if self.field(&self.attribution_field).is_none() {
            return Err(format!(
                "entity '{}' attribution_field '{}' is not one of its fields",
                self.route, self.attribution_field
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for spelling in std::iter::once(self.key_field.as_str())
            .chain(self.fields.iter().flat_map(FieldDefinition::spellings))
        {
            if !seen.insert(spelling) {
                return Err(format!(
                    "entity '{}' uses column spelling '{spelling}' more than once",
                    self.route
                ));
            }
        }
        Ok(())
    }
}

/// Entities by route, shared read-only across requests.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    by_route: HashMap<String, Arc<EntityDefinition>>,
}

impl EntityRegistry {
    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Fails on an invalid definition or a route used twice.
    pub fn new(entities: impl IntoIterator<Item = EntityDefinition>) -> Result<Self, String> {
        let mut by_route = HashMap::new();
        for entity in entities {
            entity.validate()?;
            let route = entity.route.clone();
            if by_route.insert(route.clone(), Arc::new(entity)).is_some() {
                return Err(format!("entity route '{route}' is defined twice"));
            }
        }
        Ok(Self { by_route })
    }

    pub fn get(&self, route: &str) -> Option<Arc<EntityDefinition>> {
        self.by_route.get(route).cloned()
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.by_route.values().map(|e| e.collection.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_route.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_route.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_placeholder_matches_published_shape() {
        let placeholder = EntityDefinition::product().placeholder("99999");
        assert_eq!(
            serde_json::Value::Object(placeholder),
            json!({
                "Zip": "99999",
                "Product": "N/A",
                "Recorded": "N/A",
                "ORG User": "N/A",
                "Modified User": "N/A"
            })
        );
    }

    #[test]
    fn population_placeholder_uses_canonical_names() {
        let placeholder = EntityDefinition::population().placeholder("30003");
        assert_eq!(
            serde_json::Value::Object(placeholder),
            json!({
                "Zip": "30003",
                "5 Mile Population": "N/A",
                "Recorded": "N/A",
                "ORG User": "N/A",
                "Modified User": "N/A"
            })
        );
    }

    #[test]
    fn population_accepts_underscore_spelling() {
        let population = EntityDefinition::population();
        let field = population.field("5 Mile Population").unwrap();
        let spellings: Vec<_> = field.spellings().collect();
        assert_eq!(spellings, ["5 Mile Population", "5_Mile_Population"]);
        assert!(field.required_column);
    }

    #[test]
    fn registry_rejects_duplicate_routes() {
        let err = EntityRegistry::new([EntityDefinition::product(), EntityDefinition::product()])
            .unwrap_err();
        assert!(err.contains("defined twice"));
    }

    #[test]
    fn validate_rejects_unknown_attribution_field() {
        let mut entity = EntityDefinition::product();
        entity.attribution_field = "Editor".into();
        assert!(entity.validate().is_err());
    }

    #[test]
    fn validate_rejects_colliding_spellings() {
        let mut entity = EntityDefinition::product();
        entity.fields[0].aliases.push("Recorded".into());
        assert!(entity.validate().unwrap_err().contains("more than once"));
    }

    #[test]
    fn registry_lists_collections() {
        let registry = EntityRegistry::new(EntityDefinition::defaults()).unwrap();
        let mut collections: Vec<_> = registry.collections().collect();
        collections.sort_unstable();
        assert_eq!(collections, ["Populations", "Products"]);
        assert!(registry.get("product").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
