use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Text};
use tracing::{debug, info, warn};

use super::{
    MigrationError, MigrationRecord, discover_and_order, plan_column_rebuild_from,
    plan_drop_all_tables, read_migration_dir,
};
use crate::schema::tables::{SUPPORTED_DB_VERSION, canonical_models};
use crate::schema::validate::{self, SchemaMismatch};
use crate::schema::{SchemaDefinitionError, SchemaModel, ddl};

const SQL_EXTENSION: &str = "sql";

#[derive(QueryableByName)]
struct UserVersion {
    #[diesel(sql_type = Integer)]
    user_version: i32,
}

#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}

#[derive(QueryableByName)]
struct FkViolation {
    #[diesel(sql_type = Text)]
    table: String,
    #[diesel(sql_type = Text)]
    parent: String,
}

/// Stored schema version (`PRAGMA user_version`).
pub fn user_version(conn: &mut SqliteConnection) -> QueryResult<u32> {
    let row: UserVersion = sql_query("PRAGMA user_version").get_result(conn)?;
    Ok(u32::try_from(row.user_version).unwrap_or(0))
}

/// Stamp the schema version.
pub fn set_user_version(conn: &mut SqliteConnection, version: u32) -> QueryResult<()> {
    conn.batch_execute(&format!("PRAGMA user_version = {version}"))
}

fn foreign_keys_enabled(conn: &mut SqliteConnection) -> QueryResult<bool> {
    let row: ForeignKeys = sql_query("PRAGMA foreign_keys").get_result(conn)?;
    Ok(row.foreign_keys != 0)
}

/// What [`Migrator::migrate`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found before migrating.
    pub from_version: u32,
    /// Version stamped afterwards.
    pub to_version: u32,
    /// The database was empty and the full schema was created.
    pub created_schema: bool,
    /// Names of the migration files applied, in order.
    pub applied: Vec<String>,
}

/// Brings a database to the version its models describe.
#[derive(Debug, Clone)]
pub struct Migrator {
    models: Vec<(String, Arc<SchemaModel>)>,
    supported_version: u32,
    migrations_dir: Option<PathBuf>,
}

impl Migrator {
    /// Migrator over `models` (in creation order) targeting `supported_version`.
    pub fn new<I, S>(models: I, supported_version: u32) -> Self
    where
        I: IntoIterator<Item = (S, Arc<SchemaModel>)>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(|(n, m)| (n.into(), m)).collect(),
            supported_version,
            migrations_dir: None,
        }
    }

    /// Migrator over the canonical tables at [`SUPPORTED_DB_VERSION`].
    pub fn canonical() -> Result<Self, SchemaDefinitionError> {
        Ok(Self::new(canonical_models()?, SUPPORTED_DB_VERSION))
    }

    /// Apply `.sql` migrations found in `dir`.
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(dir.into());
        self
    }

    /// Target version.
    pub fn supported_version(&self) -> u32 {
        self.supported_version
    }

    /// Tables and their models, in creation order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &SchemaModel)> {
        self.models.iter().map(|(n, m)| (n.as_str(), m.as_ref()))
    }

    /// Model of `table`.
    pub fn model(&self, table: &str) -> Option<&SchemaModel> {
        self.models().find(|(n, _)| *n == table).map(|(_, m)| m)
    }

    /// Run to completion before any sync activity.
    ///
    /// An empty database gets the full schema. Otherwise pending migrations
    /// are applied one version per transaction, then any missing tables,
    /// indexes and triggers are created and the supported version stamped.
    pub fn migrate(&self, conn: &mut SqliteConnection) -> Result<MigrationReport, MigrationError> {
        let stored = user_version(conn)?;
        let supported = self.supported_version;
        if stored > supported {
            return Err(MigrationError::Downgrade { stored, supported });
        }

        let mut report = MigrationReport {
            from_version: stored,
            to_version: stored,
            ..MigrationReport::default()
        };

        if stored == 0 && validate::existing_tables(conn)?.is_empty() {
            self.apply_schema(conn)?;
            report.created_schema = true;
            report.to_version = supported;
            info!(version = supported, tables = self.models.len(), "schema created");
            return Ok(report);
        }

        let pending = self.pending(stored)?;
        for group in pending.chunk_by(|a, b| a.version == b.version) {
            let version = group[0].version;
            conn.immediate_transaction::<_, MigrationError, _>(|conn| {
                for record in group {
                    apply_file(conn, record)?;
                }
                set_user_version(conn, version)?;
                Ok(())
            })?;
            report.applied.extend(group.iter().map(|r| r.name.clone()));
            report.to_version = version;
        }

        if stored < supported {
            self.apply_schema(conn)?;
            report.to_version = supported;
        }

        info!(from = stored, to = report.to_version, applied = report.applied.len(), "migrations done");
        Ok(report)
    }

    fn pending(&self, stored: u32) -> Result<Vec<MigrationRecord>, MigrationError> {
        let Some(dir) = &self.migrations_dir else {
            return Ok(Vec::new());
        };
        let records = discover_and_order(read_migration_dir(dir)?);
        Ok(records
            .into_iter()
            .filter(|r| r.version > stored && r.version <= self.supported_version)
            .filter(|r| {
                let ok = r.extension == SQL_EXTENSION;
                if !ok {
                    warn!(name = %r.name, "unsupported migration extension, skipped");
                }
                ok
            })
            .collect())
    }

    // CREATE ... IF NOT EXISTS for every model, then stamp the supported version.
    fn apply_schema(&self, conn: &mut SqliteConnection) -> Result<(), MigrationError> {
        let mut statements = Vec::new();
        for (table, model) in self.models() {
            statements.extend(ddl::create_table_statements(table, model)?);
        }
        conn.immediate_transaction::<_, MigrationError, _>(|conn| {
            for sql in &statements {
                debug!(%sql, "ddl");
                conn.batch_execute(sql)?;
            }
            set_user_version(conn, self.supported_version)?;
            Ok(())
        })
    }

    /// Rebuild `table` into `model`'s shape, keeping its rows.
    ///
    /// Columns present in both the live table and the model are copied.
    /// Returns the number of statements run; an empty plan is a no-op.
    pub fn rebuild_table(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        model: &SchemaModel,
    ) -> Result<usize, MigrationError> {
        let live: BTreeSet<String> = validate::table_columns(conn, table)?.into_iter().collect();
        if live.is_empty() {
            return Err(MigrationError::MissingTable(table.to_string()));
        }
        let copy: Vec<&str> = model.field_names().filter(|c| live.contains(*c)).collect();

        let mut plan = plan_column_rebuild_from(table, model, &copy)?;
        if plan.is_empty() {
            info!(table, "nothing to rebuild");
            return Ok(0);
        }
        // indexes went away with the old table
        plan.extend(ddl::create_index_sqls(table, model));

        // keep child FKs pointing at `table` rather than the renamed copy
        let fk_on = foreign_keys_enabled(conn)?;
        conn.batch_execute("PRAGMA foreign_keys=OFF; PRAGMA legacy_alter_table=ON;")?;
        let result = conn.immediate_transaction::<_, MigrationError, _>(|conn| {
            for sql in &plan {
                debug!(%sql, "rebuild");
                conn.batch_execute(sql)?;
            }
            let violations: Vec<FkViolation> = sql_query("PRAGMA foreign_key_check").load(conn)?;
            if let Some(v) = violations.first() {
                warn!(table = %v.table, parent = %v.parent, "foreign key violation after rebuild");
                return Err(MigrationError::ForeignKeyViolations {
                    table: table.to_string(),
                    count: violations.len(),
                });
            }
            Ok(())
        });
        conn.batch_execute("PRAGMA legacy_alter_table=OFF;")?;
        if fk_on {
            conn.batch_execute("PRAGMA foreign_keys=ON;")?;
        }
        result?;

        info!(table, statements = plan.len(), "table rebuilt");
        Ok(plan.len())
    }

    /// Drop every user table and reset the schema version to 0.
    pub fn drop_all_tables(
        &self,
        conn: &mut SqliteConnection,
        if_exists: bool,
    ) -> Result<usize, MigrationError> {
        let tables = validate::existing_tables(conn)?;
        let count = tables.len();
        let steps = plan_drop_all_tables(tables, if_exists);

        let fk_on = foreign_keys_enabled(conn)?;
        conn.batch_execute("PRAGMA foreign_keys=OFF;")?;
        let result = conn.immediate_transaction::<_, MigrationError, _>(|conn| {
            for step in steps {
                step(conn)?;
            }
            set_user_version(conn, 0)?;
            Ok(())
        });
        if fk_on {
            conn.batch_execute("PRAGMA foreign_keys=ON;")?;
        }
        result?;

        info!(tables = count, "all tables dropped");
        Ok(count)
    }

    /// Differences between the models and the live schema.
    pub fn validate(&self, conn: &mut SqliteConnection) -> Result<Vec<SchemaMismatch>, MigrationError> {
        Ok(validate::validate_schema(conn, self.models())?)
    }
}

fn apply_file(conn: &mut SqliteConnection, record: &MigrationRecord) -> Result<(), MigrationError> {
    let path = record
        .path
        .clone()
        .unwrap_or_else(|| Path::new(&record.name).to_path_buf());
    let sql = std::fs::read_to_string(&path)
        .map_err(|source| MigrationError::ReadFile { path: path.clone(), source })?;
    conn.batch_execute(&sql)
        .map_err(|source| MigrationError::Statement {
            name: record.name.clone(),
            source,
        })?;
    info!(name = %record.name, version = record.version, mts = record.mts, "migration applied");
    Ok(())
}
