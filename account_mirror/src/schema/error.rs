use thiserror::Error;

/// Malformed `#{...}` DDL template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Blank template text.
    #[error("template is empty")]
    Empty,
    /// A `#{` without its closing brace.
    #[error("unclosed placeholder in template: {0}")]
    Unclosed(String),
    /// A placeholder whose name is not `[A-Za-z0-9_]+`.
    #[error("invalid placeholder name {param:?} in template: {template}")]
    BadParamName {
        /// Offending placeholder text.
        param: String,
        /// Full template.
        template: String,
    },
    /// Rendering found a placeholder with no value.
    #[error("no value for placeholder {param:?} in template: {template}")]
    UnknownParam {
        /// Placeholder without a value.
        param: String,
        /// Full template.
        template: String,
    },
}

/// Raised while defining a [`SchemaModel`](super::SchemaModel) from malformed input.
///
/// These indicate a programming error in static schema data and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaDefinitionError {
    /// A field was declared with an empty (or blank) name.
    #[error("field name cannot be empty")]
    EmptyFieldName,

    /// The value is neither a primitive SQL type nor valid service metadata.
    #[error("field {field:?} has unrecognized type {value:?}")]
    UnknownType {
        /// Field name.
        field: String,
        /// Offending value as authored.
        value: String,
    },

    /// The same field name appears twice.
    #[error("field {0:?} is declared more than once")]
    DuplicateField(String),

    /// A service-metadata key carried a value of the wrong shape.
    #[error("service field {key:?} has an invalid value: {reason}")]
    InvalidServiceValue {
        /// Service key (`__constraints__`, `__indexes__`, ...).
        key: String,
        /// What was wrong.
        reason: String,
    },

    /// No columns were declared (service keys alone).
    #[error("model must declare at least one data field")]
    NoDataFields,

    /// More than one primary key column.
    #[error("model declares more than one primary key ({0:?})")]
    MultiplePrimaryKeys(Vec<String>),

    /// An index lists no columns.
    #[error("index declared without columns")]
    EmptyIndex,

    /// Two indexes of the same kind would get the same generated name:
    /// same joined columns and both partial or both plain.
    #[error("index on {0:?} is declared more than once")]
    DuplicateIndex(String),

    /// An index references a column the model does not have.
    #[error("index references unknown field {0:?}")]
    UnknownIndexField(String),

    /// A constraint or trigger template is malformed.
    #[error(transparent)]
    Template(#[from] TemplateError),
}
