//! Table definitions and the DDL derived from them.

mod error;
mod model;
mod template;
mod types;

pub mod ddl;
pub mod tables;
pub mod validate;

pub use error::{SchemaDefinitionError, TemplateError};
pub use model::{
    CONSTRAINTS_KEY, CREATED_AT_FIELD, FieldValue, ID_FIELD, INDEXES_KEY, IndexSpec,
    ModelDefinition, ModelOptions, SERVICE_KEYS, SchemaModel, SchemaModelBuilder, TRIGGERS_KEY,
    UNIQUE_INDEXES_KEY, UPDATED_AT_FIELD, is_service_key,
};
pub use template::{SqlTemplate, TABLE_NAME_PARAM};
pub use types::{SqlType, UnknownSqlType};
