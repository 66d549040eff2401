//! Logical collections: which table backs each, and how it is synced.

mod defaults;
mod descriptor;
mod registry;

pub use defaults::{
    CANDLES_CONF, PUBLIC_TRADES_CONF, STATUS_MESSAGES_CONF, TICKERS_HISTORY_CONF, default_registry,
};
pub use descriptor::{
    CollectionDescriptor, DescriptorField, Mutability, RowTransformer, SortDirection, Visibility,
    stringify_field,
};
pub use registry::{
    CollectionSchemaRegistry, DescriptorMap, RegistryError, filter_by_visibility_and_freshness,
};
