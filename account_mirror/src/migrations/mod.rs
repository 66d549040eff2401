//! Schema versioning: migration discovery, rebuild planning, and the runner
//! that applies them.
//!
//! The stored schema version lives in `PRAGMA user_version`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::TemplateError;

mod discover;
mod planner;
mod runner;

pub use discover::{MigrationEntry, MigrationRecord, discover_and_order, read_migration_dir};
pub use planner::{
    DropStep, OLD_TABLE_SUFFIX, plan_column_rebuild, plan_column_rebuild_from, plan_drop_all_tables,
};
pub use runner::{MigrationReport, Migrator, set_user_version, user_version};

/// Failure while migrating or restructuring the database.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database was written by a newer schema.
    #[error("database schema version {stored} is newer than supported version {supported}")]
    Downgrade {
        /// Version found in the database.
        stored: u32,
        /// Version this build understands.
        supported: u32,
    },
    /// The migrations directory could not be listed.
    #[error("cannot read migrations directory {}", .path.display())]
    ReadDir {
        /// Directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A migration file could not be read.
    #[error("cannot read migration file {}", .path.display())]
    ReadFile {
        /// File.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A migration's SQL failed.
    #[error("migration {name} failed")]
    Statement {
        /// Migration file name.
        name: String,
        /// Underlying error.
        #[source]
        source: diesel::result::Error,
    },
    /// Rebuild target does not exist.
    #[error("table {0} does not exist")]
    MissingTable(String),
    /// A rebuild left rows pointing at missing parents.
    #[error("rebuild of {table} left {count} foreign key violation(s)")]
    ForeignKeyViolations {
        /// Rebuilt table.
        table: String,
        /// Number of violations reported by `PRAGMA foreign_key_check`.
        count: usize,
    },
    /// A DDL template failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Any other database error.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}
