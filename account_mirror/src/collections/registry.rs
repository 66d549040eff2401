use indexmap::IndexMap;
use thiserror::Error;

use super::{CollectionDescriptor, DescriptorField, Visibility};
use crate::schema::SchemaModel;
use crate::schema::tables::USER_ID_FIELD;

/// Collection name -> descriptor, in registration order.
pub type DescriptorMap = IndexMap<String, CollectionDescriptor>;

/// A descriptor violates a registry invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two descriptors share a name.
    #[error("collection {0:?} is registered twice")]
    DuplicateCollection(String),
    /// A fetchable collection with `max_limit == 0`.
    #[error("collection {0:?} must have a positive max limit")]
    ZeroMaxLimit(String),
    /// A metadata field names a column the model lacks.
    #[error("collection {collection:?}: {role} field {field:?} is not a model column")]
    UnknownField {
        /// Collection name.
        collection: String,
        /// Which metadata field (`date`, `symbol`, `timeframe`, `sort`).
        role: &'static str,
        /// Offending column name.
        field: String,
    },
    /// Public collections are shared and must not be user-scoped.
    #[error("public collection {0:?} carries a user_id column")]
    PublicWithUserId(String),
    /// Private collections must be user-scoped.
    #[error("private collection {0:?} has no user_id column")]
    PrivateWithoutUserId(String),
    /// Hidden collection without a valid source.
    #[error("hidden collection {collection:?} has no usable source collection ({source_name:?})")]
    InvalidSource {
        /// Collection name.
        collection: String,
        /// Declared source, if any.
        source_name: Option<String>,
    },
}

/// The canonical, read-only set of collection descriptors.
#[derive(Debug, Clone)]
pub struct CollectionSchemaRegistry {
    descriptors: DescriptorMap,
}

impl CollectionSchemaRegistry {
    /// Validate and register `descriptors`.
    pub fn new(
        descriptors: impl IntoIterator<Item = CollectionDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut map = DescriptorMap::new();
        for d in descriptors {
            check_descriptor(&d)?;
            if map.contains_key(&d.name) {
                return Err(RegistryError::DuplicateCollection(d.name));
            }
            map.insert(d.name.clone(), d);
        }

        // sources are checked once everything is registered so order does not matter
        for d in map.values().filter(|d| d.visibility == Visibility::Hidden) {
            let source = d
                .source_collection
                .as_deref()
                .and_then(|s| map.get(s))
                .filter(|s| s.visibility != Visibility::Hidden);
            if source.is_none() {
                return Err(RegistryError::InvalidSource {
                    collection: d.name.clone(),
                    source_name: d.source_collection.clone(),
                });
            }
        }

        Ok(Self { descriptors: map })
    }

    /// Descriptor by collection name.
    pub fn get(&self, name: &str) -> Option<&CollectionDescriptor> {
        self.descriptors.get(name)
    }

    /// Canonical map (read-only).
    pub fn descriptors(&self) -> &DescriptorMap {
        &self.descriptors
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// No collections registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Per-run copy with `omitted` fields reset.
    ///
    /// Models and row transformers are shared with the canonical map.
    pub fn cloned_descriptor_map(&self, omitted: &[DescriptorField]) -> DescriptorMap {
        self.descriptors
            .iter()
            .map(|(name, d)| {
                let mut d = d.clone();
                for field in omitted {
                    d.omit(*field);
                }
                (name.clone(), d)
            })
            .collect()
    }

    /// Public (`is_public`) or private descriptors in registration order.
    /// Hidden collections never match.
    pub fn by_visibility(&self, is_public: bool) -> Vec<&CollectionDescriptor> {
        let wanted = wanted_visibility(is_public);
        self.descriptors
            .values()
            .filter(|d| d.visibility == wanted)
            .collect()
    }

    /// Distinct physical tables and their models; hidden views are skipped.
    pub fn table_models(&self) -> impl Iterator<Item = (&str, &SchemaModel)> {
        self.descriptors
            .values()
            .filter(|d| d.visibility != Visibility::Hidden)
            .map(|d| (d.name.as_str(), d.model.as_ref()))
    }
}

fn check_descriptor(d: &CollectionDescriptor) -> Result<(), RegistryError> {
    let model = &d.model;
    let unknown = |role: &'static str, field: &str| RegistryError::UnknownField {
        collection: d.name.clone(),
        role,
        field: field.to_string(),
    };

    let roles = [
        ("date", d.date_field_name.as_deref()),
        ("symbol", d.symbol_field_name.as_deref()),
        ("timeframe", d.timeframe_field_name.as_deref()),
    ];
    for (role, field) in roles {
        if let Some(f) = field.filter(|f| !model.has_field(f)) {
            return Err(unknown(role, f));
        }
    }
    if let Some((f, _)) = d.sort.iter().find(|(f, _)| !model.has_field(f)) {
        return Err(unknown("sort", f));
    }

    match d.visibility {
        Visibility::Public if model.has_field(USER_ID_FIELD) => {
            Err(RegistryError::PublicWithUserId(d.name.clone()))
        }
        Visibility::Private if !model.has_field(USER_ID_FIELD) => {
            Err(RegistryError::PrivateWithoutUserId(d.name.clone()))
        }
        Visibility::Public | Visibility::Private if d.max_limit == 0 => {
            Err(RegistryError::ZeroMaxLimit(d.name.clone()))
        }
        _ => Ok(()),
    }
}

/// Descriptors of the requested class that have new data.
///
/// `is_public` selects public collections; otherwise private ones. Hidden
/// collections never match.
pub fn filter_by_visibility_and_freshness(
    map: &DescriptorMap,
    is_public: bool,
) -> Vec<&CollectionDescriptor> {
    let wanted = wanted_visibility(is_public);
    map.values()
        .filter(|d| d.visibility == wanted && d.has_new_data)
        .collect()
}

fn wanted_visibility(is_public: bool) -> Visibility {
    if is_public {
        Visibility::Public
    } else {
        Visibility::Private
    }
}
