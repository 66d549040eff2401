//! Local SQLite mirror of exchange account data.
//!
//! - [`schema`]: table models, DDL rendering, and the canonical tables
//! - [`collections`]: what is mirrored and how each collection is fetched
//! - [`sync`]: incremental checkpoints and fetch cutoffs
//! - [`migrations`]: schema versioning and table rebuilds
//! - [`rate_limit`]: per-method call pacing

#![deny(missing_docs)]

pub mod collections;
pub mod config;
pub mod db;
pub mod migrations;
pub mod rate_limit;
pub mod schema;
pub mod sync;
