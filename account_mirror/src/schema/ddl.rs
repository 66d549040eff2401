//! DDL emission for [`SchemaModel`]s.
//!
//! Templates are rendered here, at the point of emission, so the same
//! constraint/trigger text serves the create path and the rebuild path.

use diesel::{SqliteConnection, connection::SimpleConnection};
use tracing::{debug, info};

use super::{IndexSpec, SchemaModel, TemplateError};

/// `CREATE TABLE` with columns followed by rendered constraints.
pub fn create_table_sql(
    table: &str,
    model: &SchemaModel,
    if_not_exists: bool,
) -> Result<String, TemplateError> {
    let mut defs: Vec<String> = model
        .model_fields()
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect();
    for c in model.constraints() {
        defs.push(c.render_for_table(table)?);
    }
    let ine = if if_not_exists { "IF NOT EXISTS " } else { "" };
    Ok(format!("CREATE TABLE {ine}{table} ({})", defs.join(", ")))
}

/// Deterministic index name: `<table>_<col>_<col>[_partial][_unique]`.
pub fn index_name(table: &str, spec: &IndexSpec, unique: bool) -> String {
    let mut name = format!("{table}_{}", spec.fields().join("_"));
    if spec.predicate().is_some() {
        name.push_str("_partial");
    }
    if unique {
        name.push_str("_unique");
    }
    name
}

fn index_sql(table: &str, spec: &IndexSpec, unique: bool) -> String {
    let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
    let mut sql = format!(
        "CREATE {kind} IF NOT EXISTS {} ON {table}({})",
        index_name(table, spec, unique),
        spec.fields().join(", ")
    );
    if let Some(pred) = spec.predicate() {
        sql.push(' ');
        sql.push_str(pred);
    }
    sql
}

/// One `CREATE [UNIQUE] INDEX IF NOT EXISTS` per declared index, plain ones first.
pub fn create_index_sqls(table: &str, model: &SchemaModel) -> Vec<String> {
    model
        .indexes()
        .iter()
        .map(|s| index_sql(table, s, false))
        .chain(model.unique_indexes().iter().map(|s| index_sql(table, s, true)))
        .collect()
}

/// Rendered trigger bodies.
pub fn trigger_sqls(table: &str, model: &SchemaModel) -> Result<Vec<String>, TemplateError> {
    model
        .triggers()
        .iter()
        .map(|t| t.render_for_table(table))
        .collect()
}

/// Table, then indexes, then triggers.
pub fn create_table_statements(
    table: &str,
    model: &SchemaModel,
) -> Result<Vec<String>, TemplateError> {
    let mut out = vec![create_table_sql(table, model, true)?];
    out.extend(create_index_sqls(table, model));
    out.extend(trigger_sqls(table, model)?);
    Ok(out)
}

/// Create every table (with its indexes and triggers) in one immediate transaction.
///
/// Returns the number of statements executed. Idempotent: all statements use
/// `IF NOT EXISTS`.
pub fn create_schema<'a>(
    conn: &mut SqliteConnection,
    models: impl IntoIterator<Item = (&'a str, &'a SchemaModel)>,
) -> anyhow::Result<usize> {
    let mut statements = Vec::new();
    for (table, model) in models {
        statements.extend(create_table_statements(table, model)?);
    }

    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        for sql in &statements {
            debug!(%sql, "ddl");
            conn.batch_execute(sql)?;
        }
        Ok(())
    })?;

    info!(statements = statements.len(), "schema created");
    Ok(statements.len())
}
