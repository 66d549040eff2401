//! Immutable table definitions.
//!
//! A [`SchemaModel`] is built once, either from a raw [`ModelDefinition`]
//! (string types plus service keys, the shape models are authored in) or through
//! [`SchemaModelBuilder`], and is read-only afterwards: every accessor hands out
//! shared references, and callers who need to tweak the column map take a copy
//! with [`SchemaModel::cloned_model_fields`].
//!
//! Service metadata (constraints, triggers, indexes, unique indexes) may be
//! authored either as a single value or as a list. [`FieldValue`] carries that
//! authored shape only up to construction; the model always stores lists.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{SchemaDefinitionError, SqlTemplate, SqlType};

/// Service key holding foreign-key/check clauses.
pub const CONSTRAINTS_KEY: &str = "__constraints__";
/// Service key holding trigger bodies.
pub const TRIGGERS_KEY: &str = "__triggers__";
/// Service key holding plain indexes.
pub const INDEXES_KEY: &str = "__indexes__";
/// Service key holding unique indexes.
pub const UNIQUE_INDEXES_KEY: &str = "__uniqueIndexes__";

/// All recognized service-metadata keys.
pub const SERVICE_KEYS: [&str; 4] = [CONSTRAINTS_KEY, TRIGGERS_KEY, INDEXES_KEY, UNIQUE_INDEXES_KEY];

/// Auto-increment row id added by [`ModelOptions::with_id`].
pub const ID_FIELD: &str = "_id";
/// Creation timestamp (ms) added by [`ModelOptions::with_timestamps`].
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Update timestamp (ms) added by [`ModelOptions::with_timestamps`].
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Whether `name` is one of [`SERVICE_KEYS`].
pub fn is_service_key(name: &str) -> bool {
    SERVICE_KEYS.contains(&name)
}

/// Authored value of one entry in a [`ModelDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A type string, or a single constraint/trigger/one-column index.
    Scalar(String),
    /// Several constraints/triggers, or the columns of one index.
    List(Vec<String>),
    /// Several indexes.
    Nested(Vec<Vec<String>>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<SqlType> for FieldValue {
    fn from(value: SqlType) -> Self {
        FieldValue::Scalar(value.as_sql().to_string())
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<Vec<&str>>> for FieldValue {
    fn from(value: Vec<Vec<&str>>) -> Self {
        FieldValue::Nested(
            value
                .into_iter()
                .map(|v| v.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// Raw, ordered field map as authored (JSON/TOML or in code).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelDefinition(pub IndexMap<String, FieldValue>);

impl ModelDefinition {
    /// Empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry (chainable).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

/// Construction options applied on top of the declared fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    /// Prepend `_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT` unless declared.
    pub with_id: bool,
    /// Append `createdAt`/`updatedAt` BIGINT columns unless declared.
    pub with_timestamps: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            with_id: true,
            with_timestamps: false,
        }
    }
}

/// One index: column list plus optional partial-index predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexSpec {
    fields: Vec<String>,
    predicate: Option<String>,
}

impl IndexSpec {
    /// Build from the authored tuple; a trailing `WHERE ...` item becomes the predicate.
    pub fn from_authored(mut items: Vec<String>) -> Result<Self, SchemaDefinitionError> {
        let has_predicate = items
            .last()
            .is_some_and(|last| last.trim_start().to_ascii_uppercase().starts_with("WHERE "));
        let predicate = if has_predicate {
            items.pop().map(|p| p.trim().to_string())
        } else {
            None
        };
        let fields: Vec<String> = items.into_iter().map(|f| f.trim().to_string()).collect();
        if fields.is_empty() || fields.iter().any(String::is_empty) {
            return Err(SchemaDefinitionError::EmptyIndex);
        }
        Ok(Self { fields, predicate })
    }

    /// Indexed columns, in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Partial-index predicate including the leading `WHERE`.
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }
}

/// Immutable definition of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    fields: IndexMap<String, SqlType>,
    constraints: Vec<SqlTemplate>,
    triggers: Vec<SqlTemplate>,
    indexes: Vec<IndexSpec>,
    unique_indexes: Vec<IndexSpec>,
}

impl SchemaModel {
    /// Define a model from an authored field map.
    ///
    /// Every key is either a service key or a column whose value must be one of
    /// the [`SqlType`] spellings.
    pub fn define(
        definition: ModelDefinition,
        options: ModelOptions,
    ) -> Result<Self, SchemaDefinitionError> {
        let mut parts = Parts::default();

        for (name, value) in definition.0 {
            match name.as_str() {
                CONSTRAINTS_KEY => parts.constraints.extend(scalar_or_list(&name, value)?),
                TRIGGERS_KEY => parts.triggers.extend(scalar_or_list(&name, value)?),
                INDEXES_KEY => parts.indexes.extend(index_lists(&name, value)?),
                UNIQUE_INDEXES_KEY => parts.unique_indexes.extend(index_lists(&name, value)?),
                _ => {
                    let raw = match value {
                        FieldValue::Scalar(raw) => raw,
                        other => {
                            return Err(SchemaDefinitionError::UnknownType {
                                field: name,
                                value: format!("{other:?}"),
                            });
                        }
                    };
                    let ty = raw
                        .parse::<SqlType>()
                        .map_err(|_| SchemaDefinitionError::UnknownType {
                            field: name.clone(),
                            value: raw.clone(),
                        })?;
                    parts.fields.push((name, ty));
                }
            }
        }

        parts.assemble(options)
    }

    /// Typed builder for models declared in code.
    pub fn builder() -> SchemaModelBuilder {
        SchemaModelBuilder::default()
    }

    /// True data columns only (service metadata excluded).
    pub fn model_fields(&self) -> &IndexMap<String, SqlType> {
        &self.fields
    }

    /// Independent copy of the column map, safe to mutate.
    pub fn cloned_model_fields(&self) -> IndexMap<String, SqlType> {
        self.fields.clone()
    }

    /// Column names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Whether the model declares `name` as a column.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Type of column `name`.
    pub fn field_type(&self, name: &str) -> Option<SqlType> {
        self.fields.get(name).copied()
    }

    /// Name of the primary key column, if any.
    pub fn primary_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, t)| t.is_primary_key())
            .map(|(n, _)| n.as_str())
    }

    /// Constraint templates.
    pub fn constraints(&self) -> &[SqlTemplate] {
        &self.constraints
    }

    /// Trigger templates.
    pub fn triggers(&self) -> &[SqlTemplate] {
        &self.triggers
    }

    /// Plain indexes.
    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Unique indexes.
    pub fn unique_indexes(&self) -> &[IndexSpec] {
        &self.unique_indexes
    }
}

/// Builder behind [`SchemaModel::builder`].
#[derive(Debug, Default)]
pub struct SchemaModelBuilder {
    options: ModelOptions,
    parts: Parts,
}

impl SchemaModelBuilder {
    /// Override construction options.
    pub fn options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a column.
    pub fn field(mut self, name: impl Into<String>, ty: SqlType) -> Self {
        self.parts.fields.push((name.into(), ty));
        self
    }

    /// Append a constraint template.
    pub fn constraint(mut self, template: impl Into<String>) -> Self {
        self.parts.constraints.push(template.into());
        self
    }

    /// Append a trigger template.
    pub fn trigger(mut self, template: impl Into<String>) -> Self {
        self.parts.triggers.push(template.into());
        self
    }

    /// Append an index; a trailing `WHERE ...` item makes it partial.
    pub fn index(mut self, items: &[&str]) -> Self {
        self.parts.indexes.push(items.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Append a unique index; a trailing `WHERE ...` item makes it partial.
    pub fn unique_index(mut self, items: &[&str]) -> Self {
        self.parts
            .unique_indexes
            .push(items.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<SchemaModel, SchemaDefinitionError> {
        self.parts.assemble(self.options)
    }
}

#[derive(Debug, Default)]
struct Parts {
    fields: Vec<(String, SqlType)>,
    constraints: Vec<String>,
    triggers: Vec<String>,
    indexes: Vec<Vec<String>>,
    unique_indexes: Vec<Vec<String>>,
}

impl Parts {
    fn assemble(self, options: ModelOptions) -> Result<SchemaModel, SchemaDefinitionError> {
        let mut declared: IndexMap<String, SqlType> = IndexMap::with_capacity(self.fields.len() + 3);
        for (raw_name, ty) in self.fields {
            let name = raw_name.trim().to_string();
            if name.is_empty() {
                return Err(SchemaDefinitionError::EmptyFieldName);
            }
            if declared.insert(name.clone(), ty).is_some() {
                return Err(SchemaDefinitionError::DuplicateField(name));
            }
        }

        if declared.is_empty() {
            return Err(SchemaDefinitionError::NoDataFields);
        }

        let mut fields = IndexMap::with_capacity(declared.len() + 3);
        if options.with_id && !declared.contains_key(ID_FIELD) {
            fields.insert(ID_FIELD.to_string(), SqlType::IdPrimaryKey);
        }
        fields.extend(declared);
        if options.with_timestamps {
            for ts in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
                fields.entry(ts.to_string()).or_insert(SqlType::Bigint);
            }
        }

        let pks: Vec<String> = fields
            .iter()
            .filter(|(_, t)| t.is_primary_key())
            .map(|(n, _)| n.clone())
            .collect();
        if pks.len() > 1 {
            return Err(SchemaDefinitionError::MultiplePrimaryKeys(pks));
        }

        let constraints = self
            .constraints
            .into_iter()
            .map(SqlTemplate::parse)
            .collect::<Result<Vec<_>, _>>()?;
        let triggers = self
            .triggers
            .into_iter()
            .map(SqlTemplate::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let to_specs = |lists: Vec<Vec<String>>| -> Result<Vec<IndexSpec>, SchemaDefinitionError> {
            lists
                .into_iter()
                .map(|items| {
                    let spec = IndexSpec::from_authored(items)?;
                    if let Some(missing) = spec.fields().iter().find(|f| !fields.contains_key(*f)) {
                        return Err(SchemaDefinitionError::UnknownIndexField(missing.clone()));
                    }
                    Ok(spec)
                })
                .collect()
        };
        let indexes = to_specs(self.indexes)?;
        let unique_indexes = to_specs(self.unique_indexes)?;
        reject_duplicate_indexes(&indexes)?;
        reject_duplicate_indexes(&unique_indexes)?;

        Ok(SchemaModel {
            fields,
            constraints,
            triggers,
            indexes,
            unique_indexes,
        })
    }
}

// Generated names are `<table>_<cols joined by _>[_partial][_unique]`, so
// specs sharing the joined columns and partial-ness would collide.
fn reject_duplicate_indexes(specs: &[IndexSpec]) -> Result<(), SchemaDefinitionError> {
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        let joined = spec.fields().join("_");
        if !seen.insert((joined.clone(), spec.predicate().is_some())) {
            return Err(SchemaDefinitionError::DuplicateIndex(joined));
        }
    }
    Ok(())
}

fn scalar_or_list(key: &str, value: FieldValue) -> Result<Vec<String>, SchemaDefinitionError> {
    match value {
        FieldValue::Scalar(s) => Ok(vec![s]),
        FieldValue::List(v) => Ok(v),
        FieldValue::Nested(_) => Err(SchemaDefinitionError::InvalidServiceValue {
            key: key.to_string(),
            reason: "expected a string or a list of strings".into(),
        }),
    }
}

fn index_lists(key: &str, value: FieldValue) -> Result<Vec<Vec<String>>, SchemaDefinitionError> {
    match value {
        FieldValue::Scalar(s) => Ok(vec![vec![s]]),
        FieldValue::List(v) => Ok(vec![v]),
        FieldValue::Nested(v) if v.is_empty() => Err(SchemaDefinitionError::InvalidServiceValue {
            key: key.to_string(),
            reason: "empty index list".into(),
        }),
        FieldValue::Nested(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledgers_definition() -> ModelDefinition {
        ModelDefinition::new()
            .with("id", "BIGINT")
            .with("currency", "VARCHAR(255)")
            .with("mts", "BIGINT")
            .with("amount", "DECIMAL(22,12)")
            .with("user_id", "INTEGER NOT NULL")
            .with(
                CONSTRAINTS_KEY,
                "CONSTRAINT #{tableName}_fk_user_id FOREIGN KEY (user_id) REFERENCES users(_id) ON DELETE CASCADE",
            )
            .with(INDEXES_KEY, vec![vec!["user_id", "mts"], vec!["user_id", "currency", "mts"]])
            .with(UNIQUE_INDEXES_KEY, vec!["id", "user_id"])
    }

    #[test]
    fn define_separates_service_metadata_from_columns() {
        let m = SchemaModel::define(ledgers_definition(), ModelOptions::default()).unwrap();

        let names: Vec<&str> = m.field_names().collect();
        assert_eq!(names, vec!["_id", "id", "currency", "mts", "amount", "user_id"]);
        assert!(!m.has_field(CONSTRAINTS_KEY));
        assert_eq!(m.primary_key(), Some("_id"));

        assert_eq!(m.constraints().len(), 1);
        assert_eq!(m.triggers().len(), 0);
        assert_eq!(m.indexes().len(), 2);
        assert_eq!(m.unique_indexes().len(), 1);
        assert_eq!(m.unique_indexes()[0].fields(), ["id", "user_id"]);
    }

    #[test]
    fn single_and_list_service_values_normalize_to_lists() {
        let one = SchemaModel::define(
            ModelDefinition::new()
                .with("mts", "BIGINT")
                .with(TRIGGERS_KEY, "CREATE TRIGGER IF NOT EXISTS #{tableName}_t AFTER INSERT ON #{tableName} BEGIN SELECT 1; END")
                .with(INDEXES_KEY, "mts"),
            ModelOptions::default(),
        )
        .unwrap();
        let many = SchemaModel::define(
            ModelDefinition::new()
                .with("mts", "BIGINT")
                .with(
                    TRIGGERS_KEY,
                    vec!["CREATE TRIGGER IF NOT EXISTS #{tableName}_t AFTER INSERT ON #{tableName} BEGIN SELECT 1; END"],
                )
                .with(INDEXES_KEY, vec![vec!["mts"]]),
            ModelOptions::default(),
        )
        .unwrap();

        assert_eq!(one, many);
        assert_eq!(one.indexes()[0].fields(), ["mts"]);
    }

    #[test]
    fn partial_index_predicate_is_split_off() {
        let m = SchemaModel::builder()
            .field("subUserId", SqlType::Integer)
            .field("user_id", SqlType::IntegerNotNull)
            .unique_index(&["user_id", "subUserId", "WHERE subUserId IS NOT NULL"])
            .build()
            .unwrap();
        let idx = &m.unique_indexes()[0];
        assert_eq!(idx.fields(), ["user_id", "subUserId"]);
        assert_eq!(idx.predicate(), Some("WHERE subUserId IS NOT NULL"));
    }

    #[test]
    fn rejects_malformed_definitions() {
        let unknown = SchemaModel::define(
            ModelDefinition::new().with("mts", "TIMESTAMP"),
            ModelOptions::default(),
        );
        assert!(matches!(unknown, Err(SchemaDefinitionError::UnknownType { ref field, .. }) if field == "mts"));

        let unknown_service = SchemaModel::define(
            ModelDefinition::new().with("mts", "BIGINT").with("__checks__", "CHECK (mts > 0)"),
            ModelOptions::default(),
        );
        assert!(matches!(unknown_service, Err(SchemaDefinitionError::UnknownType { .. })));

        let empty_name = SchemaModel::builder().field("  ", SqlType::Text).build();
        assert_eq!(empty_name, Err(SchemaDefinitionError::EmptyFieldName));

        let only_service = SchemaModel::define(
            ModelDefinition::new().with(CONSTRAINTS_KEY, "CHECK (1)"),
            ModelOptions::default(),
        );
        assert_eq!(only_service, Err(SchemaDefinitionError::NoDataFields));

        let bad_index = SchemaModel::builder()
            .field("mts", SqlType::Bigint)
            .index(&["nope"])
            .build();
        assert_eq!(bad_index, Err(SchemaDefinitionError::UnknownIndexField("nope".into())));

        let dup = SchemaModel::builder()
            .field("mts", SqlType::Bigint)
            .field("mts", SqlType::Text)
            .build();
        assert_eq!(dup, Err(SchemaDefinitionError::DuplicateField("mts".into())));
    }

    #[test]
    fn indexes_with_colliding_names_are_rejected() {
        let partial_twice = SchemaModel::builder()
            .field("collName", SqlType::VarcharNotNull)
            .field("symbol", SqlType::Varchar)
            .unique_index(&["collName", "symbol", "WHERE symbol IS NOT NULL"])
            .unique_index(&["collName", "symbol", "WHERE symbol IS NULL"])
            .build();
        assert_eq!(
            partial_twice,
            Err(SchemaDefinitionError::DuplicateIndex("collName_symbol".into()))
        );

        let same_plain = SchemaModel::builder()
            .field("mts", SqlType::Bigint)
            .index(&["mts"])
            .index(&["mts"])
            .build();
        assert_eq!(same_plain, Err(SchemaDefinitionError::DuplicateIndex("mts".into())));

        // plain + partial and plain + unique get distinct names
        let distinct = SchemaModel::builder()
            .field("collName", SqlType::VarcharNotNull)
            .field("symbol", SqlType::Varchar)
            .index(&["collName", "symbol"])
            .index(&["collName", "symbol", "WHERE symbol IS NULL"])
            .unique_index(&["collName", "symbol"])
            .build()
            .unwrap();
        assert_eq!(distinct.indexes().len(), 2);
        assert_eq!(distinct.unique_indexes().len(), 1);
    }

    #[test]
    fn key_only_declaration_is_accepted() {
        let m = SchemaModel::builder()
            .field("rowid", SqlType::IntegerPrimaryKey)
            .options(ModelOptions {
                with_id: false,
                ..ModelOptions::default()
            })
            .build()
            .unwrap();
        assert_eq!(m.model_fields().len(), 1);
        assert_eq!(m.primary_key(), Some("rowid"));
    }

    #[test]
    fn options_add_id_and_timestamps_once() {
        let m = SchemaModel::builder()
            .options(ModelOptions {
                with_id: true,
                with_timestamps: true,
            })
            .field("email", SqlType::VarcharNotNull)
            .field(CREATED_AT_FIELD, SqlType::BigintNotNull)
            .build()
            .unwrap();
        let names: Vec<&str> = m.field_names().collect();
        assert_eq!(names, vec!["_id", "email", "createdAt", "updatedAt"]);
        assert_eq!(m.field_type(CREATED_AT_FIELD), Some(SqlType::BigintNotNull));

        let two_pks = SchemaModel::builder()
            .field("rowid", SqlType::IntegerPrimaryKey)
            .field("x", SqlType::Text)
            .build();
        assert!(matches!(two_pks, Err(SchemaDefinitionError::MultiplePrimaryKeys(_))));
    }

    #[test]
    fn clone_is_structurally_equal_and_field_copy_is_detached() {
        let m = SchemaModel::define(ledgers_definition(), ModelOptions::default()).unwrap();
        let cloned = m.clone();
        assert_eq!(cloned, m);

        let mut fields = m.cloned_model_fields();
        fields.insert("extra".into(), SqlType::Text);
        fields.shift_remove("mts");
        assert!(!m.has_field("extra"));
        assert!(m.has_field("mts"));
    }

    #[test]
    fn definition_deserializes_from_json() {
        let raw = r#"{
            "mts": "BIGINT",
            "symbol": "VARCHAR(255)",
            "__indexes__": [["symbol", "mts"]],
            "__constraints__": "CHECK (mts >= 0)"
        }"#;
        let def: ModelDefinition = serde_json::from_str(raw).unwrap();
        let m = SchemaModel::define(def, ModelOptions::default()).unwrap();
        assert_eq!(m.indexes()[0].fields(), ["symbol", "mts"]);
        assert_eq!(m.constraints()[0].as_str(), "CHECK (mts >= 0)");
    }
}
