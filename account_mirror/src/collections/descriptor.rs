use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::SchemaModel;
use crate::sync::RangeEntry;

/// Which sync pass a collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Per-user account data.
    Private,
    /// Market data shared by all users.
    Public,
    /// Derived view over another collection; never fetched.
    Hidden,
}

/// How fetched rows are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    /// Rows are append-only.
    Insertable,
    /// Rows are replaced on every sync.
    Updatable,
}

/// Sort direction of a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Per-row hook applied to fetched rows before they are stored.
pub type RowTransformer = Arc<dyn Fn(&mut Map<String, Value>) + Send + Sync>;

/// Top-level descriptor fields that can be omitted from a cloned map.
///
/// An omitted field is reset to its empty/default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorField {
    /// `date_field_name`
    DateFieldName,
    /// `symbol_field_name`
    SymbolFieldName,
    /// `timeframe_field_name`
    TimeframeFieldName,
    /// `sort`
    Sort,
    /// `conf_name`
    ConfName,
    /// `row_transformer`
    RowTransformer,
    /// `has_new_data`
    HasNewData,
    /// `start`
    Start,
    /// `is_sync_required_at_least_once`
    IsSyncRequiredAtLeastOnce,
}

/// Sync metadata for one logical collection.
///
/// The canonical descriptors live in a
/// [`CollectionSchemaRegistry`](super::CollectionSchemaRegistry) and are never
/// touched; sync runs mutate their own clones (`has_new_data`, `start`).
#[derive(Clone)]
pub struct CollectionDescriptor {
    /// Collection (and, unless hidden, table) name.
    pub name: String,
    /// Remote method that fetches this collection.
    pub api_method: String,
    /// Shared table model.
    pub model: Arc<SchemaModel>,
    /// Max rows per fetched page.
    pub max_limit: u32,
    /// Column holding the row timestamp (ms).
    pub date_field_name: Option<String>,
    /// Column holding the symbol.
    pub symbol_field_name: Option<String>,
    /// Column holding the candle timeframe.
    pub timeframe_field_name: Option<String>,
    /// Page ordering.
    pub sort: Vec<(String, SortDirection)>,
    /// Sync class.
    pub visibility: Visibility,
    /// Write mode.
    pub mutability: Mutability,
    /// Must complete one sync before the collection is usable.
    pub is_sync_required_at_least_once: bool,
    /// Key of the user-configurable start override.
    pub conf_name: Option<String>,
    /// For hidden collections: the collection whose rows back this view.
    pub source_collection: Option<String>,
    /// Applied to each fetched row.
    pub row_transformer: Option<RowTransformer>,
    /// Set by the sync driver when the remote side has rows past the checkpoint.
    pub has_new_data: bool,
    /// Per-run tracked ranges, merged by [`SyncRangeTracker`](crate::sync::SyncRangeTracker).
    pub start: Vec<RangeEntry>,
}

impl fmt::Debug for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("name", &self.name)
            .field("api_method", &self.api_method)
            .field("max_limit", &self.max_limit)
            .field("date_field_name", &self.date_field_name)
            .field("symbol_field_name", &self.symbol_field_name)
            .field("timeframe_field_name", &self.timeframe_field_name)
            .field("sort", &self.sort)
            .field("visibility", &self.visibility)
            .field("mutability", &self.mutability)
            .field("is_sync_required_at_least_once", &self.is_sync_required_at_least_once)
            .field("conf_name", &self.conf_name)
            .field("source_collection", &self.source_collection)
            .field("row_transformer", &self.row_transformer.is_some())
            .field("has_new_data", &self.has_new_data)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl CollectionDescriptor {
    /// Private, insertable descriptor with no date/symbol metadata.
    pub fn new(
        name: impl Into<String>,
        api_method: impl Into<String>,
        model: Arc<SchemaModel>,
        max_limit: u32,
    ) -> Self {
        Self {
            name: name.into(),
            api_method: api_method.into(),
            model,
            max_limit,
            date_field_name: None,
            symbol_field_name: None,
            timeframe_field_name: None,
            sort: Vec::new(),
            visibility: Visibility::Private,
            mutability: Mutability::Insertable,
            is_sync_required_at_least_once: false,
            conf_name: None,
            source_collection: None,
            row_transformer: None,
            has_new_data: false,
            start: Vec::new(),
        }
    }

    /// Date column; also sorts newest first on it.
    pub fn dated(mut self, field: &str) -> Self {
        self.date_field_name = Some(field.to_string());
        self.sort = vec![(field.to_string(), SortDirection::Desc)];
        self
    }

    /// Symbol column.
    pub fn symbol_field(mut self, field: &str) -> Self {
        self.symbol_field_name = Some(field.to_string());
        self
    }

    /// Timeframe column.
    pub fn timeframe_field(mut self, field: &str) -> Self {
        self.timeframe_field_name = Some(field.to_string());
        self
    }

    /// Replace the page ordering.
    pub fn sort(mut self, sort: &[(&str, SortDirection)]) -> Self {
        self.sort = sort.iter().map(|(f, d)| (f.to_string(), *d)).collect();
        self
    }

    /// Mark as public market data.
    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    /// Mark as a hidden view over `source`.
    pub fn hidden_from(mut self, source: &str) -> Self {
        self.visibility = Visibility::Hidden;
        self.source_collection = Some(source.to_string());
        self
    }

    /// Rows are replaced rather than appended.
    pub fn updatable(mut self) -> Self {
        self.mutability = Mutability::Updatable;
        self
    }

    /// Require one completed sync.
    pub fn sync_required_at_least_once(mut self) -> Self {
        self.is_sync_required_at_least_once = true;
        self
    }

    /// Link to a start-date override.
    pub fn conf_name(mut self, name: &str) -> Self {
        self.conf_name = Some(name.to_string());
        self
    }

    /// Attach a row transformer.
    pub fn row_transformer(
        mut self,
        f: impl Fn(&mut Map<String, Value>) + Send + Sync + 'static,
    ) -> Self {
        self.row_transformer = Some(Arc::new(f));
        self
    }

    /// Physical table backing the collection.
    pub fn table_name(&self) -> &str {
        self.source_collection.as_deref().unwrap_or(&self.name)
    }

    /// Run the row transformer, if any.
    pub fn transform_row(&self, row: &mut Map<String, Value>) {
        if let Some(t) = &self.row_transformer {
            t(row);
        }
    }

    /// Reset one field to its default.
    pub fn omit(&mut self, field: DescriptorField) {
        match field {
            DescriptorField::DateFieldName => self.date_field_name = None,
            DescriptorField::SymbolFieldName => self.symbol_field_name = None,
            DescriptorField::TimeframeFieldName => self.timeframe_field_name = None,
            DescriptorField::Sort => self.sort.clear(),
            DescriptorField::ConfName => self.conf_name = None,
            DescriptorField::RowTransformer => self.row_transformer = None,
            DescriptorField::HasNewData => self.has_new_data = false,
            DescriptorField::Start => self.start.clear(),
            DescriptorField::IsSyncRequiredAtLeastOnce => {
                self.is_sync_required_at_least_once = false
            }
        }
    }
}

/// Transformer that serializes object/array values of `field` to JSON text.
pub fn stringify_field(field: &'static str) -> impl Fn(&mut Map<String, Value>) + Send + Sync {
    move |row| {
        if let Some(v) = row.get_mut(field).filter(|v| v.is_object() || v.is_array()) {
            *v = Value::String(v.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;
    use serde_json::json;

    fn model() -> Arc<SchemaModel> {
        Arc::new(
            SchemaModel::builder()
                .field("time", SqlType::Bigint)
                .field("extraData", SqlType::Text)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn builder_sets_sync_metadata() {
        let d = CollectionDescriptor::new("logins", "getLogins", model(), 250)
            .dated("time")
            .row_transformer(stringify_field("extraData"));
        assert_eq!(d.sort, vec![("time".to_string(), SortDirection::Desc)]);
        assert_eq!(d.visibility, Visibility::Private);
        assert_eq!(d.table_name(), "logins");

        let mut row = json!({"time": 1, "extraData": {"ua": "x"}})
            .as_object()
            .cloned()
            .unwrap();
        d.transform_row(&mut row);
        assert_eq!(row["extraData"], json!(r#"{"ua":"x"}"#));
    }

    #[test]
    fn hidden_view_reads_source_table() {
        let d = CollectionDescriptor::new("wallets", "getWallets", model(), 0).hidden_from("ledgers");
        assert_eq!(d.visibility, Visibility::Hidden);
        assert_eq!(d.table_name(), "ledgers");
    }

    #[test]
    fn omit_resets_field() {
        let mut d = CollectionDescriptor::new("logins", "getLogins", model(), 250)
            .dated("time")
            .conf_name("loginsConf");
        d.omit(DescriptorField::Sort);
        d.omit(DescriptorField::ConfName);
        assert!(d.sort.is_empty());
        assert!(d.conf_name.is_none());
        assert_eq!(d.date_field_name.as_deref(), Some("time"));
    }
}
