//! SQLite connection helpers.
//!
//! Example:
//! ```no_run
//! use account_mirror::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("account_mirror_example.db");
//! let _conn = connect_sqlite(path.to_str().unwrap()).expect("open sqlite");
//! ```

use anyhow::Context;
use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};
use tracing::debug;

/// Open a SQLite connection and apply connection-wide PRAGMAs.
///
/// `sqlite:` / `sqlite://` prefixes are accepted and stripped.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let path = strip_scheme(database_url);
    let mut conn = SqliteConnection::establish(path)
        .with_context(|| format!("opening sqlite database {path}"))?;

    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    // cascades from users rely on this; it is per-connection
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    debug!(path, "sqlite connection ready");
    Ok(conn)
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}
