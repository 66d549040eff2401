use diesel::{QueryResult, RunQueryDsl, SqliteConnection};
use tracing::debug;

use crate::schema::{SchemaModel, TemplateError, ddl};

/// Suffix of the table a rebuild renames the live table to.
pub const OLD_TABLE_SUFFIX: &str = "Old";

/// Deferred `DROP TABLE`; the caller supplies the connection (and transaction).
pub type DropStep = Box<dyn FnOnce(&mut SqliteConnection) -> QueryResult<usize> + Send>;

/// Rename, create, copy, drop, triggers: the statements that rebuild `table`
/// into `model`'s shape.
///
/// Every model column is copied. Returns an empty plan when the model has
/// fewer than two columns, the primary key included.
pub fn plan_column_rebuild(table: &str, model: &SchemaModel) -> Result<Vec<String>, TemplateError> {
    let columns: Vec<&str> = model.field_names().collect();
    plan_column_rebuild_from(table, model, &columns)
}

/// [`plan_column_rebuild`] copying only `copy_columns`.
///
/// Used when the live table lacks some model columns; those start out NULL.
pub fn plan_column_rebuild_from(
    table: &str,
    model: &SchemaModel,
    copy_columns: &[&str],
) -> Result<Vec<String>, TemplateError> {
    let data_fields = model.model_fields().len();
    if data_fields < 2 {
        debug!(table, data_fields, "rebuild skipped, model too small");
        return Ok(Vec::new());
    }

    let old = format!("{table}{OLD_TABLE_SUFFIX}");
    let cols = copy_columns.join(", ");

    let mut plan = vec![
        format!("ALTER TABLE {table} RENAME TO {old}"),
        ddl::create_table_sql(table, model, false)?,
        format!("INSERT INTO {table} ({cols}) SELECT {cols} FROM {old}"),
        format!("DROP TABLE {old}"),
    ];
    plan.extend(ddl::trigger_sqls(table, model)?);
    Ok(plan)
}

/// One deferred drop per table, in the order given.
pub fn plan_drop_all_tables<I, S>(list_tables: I, if_exists: bool) -> Vec<DropStep>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let clause = if if_exists { "IF EXISTS " } else { "" };
    list_tables
        .into_iter()
        .map(|t| {
            let table: String = t.into();
            let sql = format!("DROP TABLE {clause}{table}");
            Box::new(move |conn: &mut SqliteConnection| {
                debug!(%sql, "drop");
                diesel::sql_query(sql).execute(conn)
            }) as DropStep
        })
        .collect()
}
