//! Database utilities.
//!
//! - [`connection::connect_sqlite`] opens a connection with WAL, foreign_keys=ON and a
//!   5000ms busy_timeout.
//! - [`schema`] holds the Diesel table definitions for the service tables the crate
//!   reads and writes directly (users, sync checkpoints).
//!
//! Example:
//! ```no_run
//! use account_mirror::db::connection;
//! use account_mirror::migrations::Migrator;
//!
//! let db_path = std::env::temp_dir().join("account_mirror_example.db");
//! let mut conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! Migrator::canonical().expect("models").migrate(&mut conn).expect("migrate");
//! ```

pub mod connection;
#[allow(missing_docs)]
pub mod schema;
