//! Compare the physical SQLite schema against the declared models.

use std::collections::BTreeSet;
use std::fmt;

use diesel::prelude::*;
use diesel::sql_types::Text;

use super::SchemaModel;

/// One difference between a declared model and the live database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    /// Declared table does not exist.
    MissingTable(String),
    /// Declared column is absent from the table.
    MissingColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Table carries a column the model does not declare.
    UnexpectedColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMismatch::MissingTable(t) => write!(f, "missing table {t}"),
            SchemaMismatch::MissingColumn { table, column } => {
                write!(f, "missing column {table}.{column}")
            }
            SchemaMismatch::UnexpectedColumn { table, column } => {
                write!(f, "unexpected column {table}.{column}")
            }
        }
    }
}

#[derive(QueryableByName)]
struct NameRow {
    #[diesel(sql_type = Text)]
    name: String,
}

/// User tables currently present (sqlite internals excluded).
pub fn existing_tables(conn: &mut SqliteConnection) -> QueryResult<BTreeSet<String>> {
    let rows: Vec<NameRow> = diesel::sql_query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .load(conn)?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

/// Column names of `table`, in physical order.
pub fn table_columns(conn: &mut SqliteConnection, table: &str) -> QueryResult<Vec<String>> {
    let rows: Vec<NameRow> = diesel::sql_query("SELECT name FROM pragma_table_info(?)")
        .bind::<Text, _>(table)
        .load(conn)?;
    Ok(rows.into_iter().map(|r| r.name).collect())
}

/// Every mismatch between `models` and the live schema; empty means in sync.
///
/// Column order is not compared, only membership.
pub fn validate_schema<'a>(
    conn: &mut SqliteConnection,
    models: impl IntoIterator<Item = (&'a str, &'a SchemaModel)>,
) -> QueryResult<Vec<SchemaMismatch>> {
    let tables = existing_tables(conn)?;
    let mut out = Vec::new();

    for (table, model) in models {
        if !tables.contains(table) {
            out.push(SchemaMismatch::MissingTable(table.to_string()));
            continue;
        }
        let actual: BTreeSet<String> = table_columns(conn, table)?.into_iter().collect();
        for column in model.field_names() {
            if !actual.contains(column) {
                out.push(SchemaMismatch::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        for column in &actual {
            if !model.has_field(column) {
                out.push(SchemaMismatch::UnexpectedColumn {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }
    }

    Ok(out)
}
