use std::fs;
use std::sync::Arc;

use account_mirror::migrations::{MigrationError, Migrator, user_version};
use account_mirror::schema::tables::{LEDGERS, SUPPORTED_DB_VERSION, USERS};
use account_mirror::schema::validate::{SchemaMismatch, existing_tables, table_columns};
use account_mirror::schema::{SchemaModel, SqlType};
use diesel::connection::SimpleConnection;
use tempfile::TempDir;

mod common;

fn ledgers_v1() -> SchemaModel {
    SchemaModel::builder()
        .field("mts", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .index(&["mts"])
        .build()
        .expect("model")
}

fn ledgers_v2() -> SchemaModel {
    SchemaModel::builder()
        .field("mts", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("note", SqlType::Varchar)
        .index(&["mts"])
        .build()
        .expect("model")
}

#[test]
fn fresh_database_gets_canonical_schema() {
    let (_db, mut conn) = common::empty_db();
    common::assert_sqlite_pragmas(&mut conn);

    let migrator = Migrator::canonical().expect("models");
    let report = migrator.migrate(&mut conn).expect("migrate");
    assert!(report.created_schema);
    assert_eq!(report.to_version, SUPPORTED_DB_VERSION);
    assert_eq!(user_version(&mut conn).unwrap(), SUPPORTED_DB_VERSION);

    let tables = existing_tables(&mut conn).unwrap();
    assert_eq!(tables.len(), migrator.models().count());
    assert!(migrator.validate(&mut conn).unwrap().is_empty());

    // rerun is a no-op and keeps the connection pragmas intact
    let again = migrator.migrate(&mut conn).expect("migrate again");
    assert!(!again.created_schema && again.applied.is_empty());
    common::assert_sqlite_pragmas(&mut conn);
}

#[test]
fn sql_files_are_applied_by_version_then_mts() {
    let (_db, mut conn) = common::empty_db();
    Migrator::new([("ledgers", Arc::new(ledgers_v1()))], 1)
        .migrate(&mut conn)
        .expect("v1");

    let dir = TempDir::new().unwrap();
    let files = [
        ("migration.v1.sql", "CREATE TABLE never (x INTEGER);"),
        ("migration.v2.1000.sql", "ALTER TABLE ledgers ADD COLUMN note VARCHAR(255);"),
        ("migration.v2.500.sql", "CREATE TABLE scratch (x INTEGER);"),
        ("migration.v2.700.js", "module.exports = {}"),
        ("migration.v3.sql", "CREATE TABLE future (x INTEGER);"),
        ("README.md", "not a migration"),
    ];
    for (name, body) in files {
        fs::write(dir.path().join(name), body).unwrap();
    }

    let report = Migrator::new([("ledgers", Arc::new(ledgers_v2()))], 2)
        .with_migrations_dir(dir.path())
        .migrate(&mut conn)
        .expect("v2");
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, 2);
    assert_eq!(report.applied, vec!["migration.v2.500.sql", "migration.v2.1000.sql"]);
    assert_eq!(user_version(&mut conn).unwrap(), 2);

    let tables = existing_tables(&mut conn).unwrap();
    assert!(tables.contains("scratch"));
    assert!(!tables.contains("never") && !tables.contains("future"));
    assert!(table_columns(&mut conn, "ledgers").unwrap().contains(&"note".to_string()));
}

#[test]
fn failing_migration_rolls_back_its_version() {
    let (_db, mut conn) = common::empty_db();
    Migrator::new([("ledgers", Arc::new(ledgers_v1()))], 1)
        .migrate(&mut conn)
        .expect("v1");

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("migration.v2.1.sql"), "CREATE TABLE half (x INTEGER);").unwrap();
    fs::write(dir.path().join("migration.v2.2.sql"), "ALTER TABLE nope ADD COLUMN y INTEGER;").unwrap();

    let err = Migrator::new([("ledgers", Arc::new(ledgers_v1()))], 2)
        .with_migrations_dir(dir.path())
        .migrate(&mut conn)
        .unwrap_err();
    assert!(matches!(err, MigrationError::Statement { ref name, .. } if name == "migration.v2.2.sql"));
    assert_eq!(user_version(&mut conn).unwrap(), 1);
    assert!(!existing_tables(&mut conn).unwrap().contains("half"));
}

#[test]
fn rebuild_adds_columns_and_keeps_rows() {
    let (_db, mut conn) = common::empty_db();
    Migrator::new([("ledgers", Arc::new(ledgers_v1()))], 1)
        .migrate(&mut conn)
        .expect("v1");
    conn.batch_execute("INSERT INTO ledgers (mts, amount) VALUES (1, 10.5), (2, -3);")
        .unwrap();

    let v2 = Migrator::new([("ledgers", Arc::new(ledgers_v2()))], 2);
    assert_eq!(
        v2.validate(&mut conn).unwrap(),
        vec![SchemaMismatch::MissingColumn {
            table: "ledgers".into(),
            column: "note".into(),
        }]
    );

    let model = v2.model("ledgers").unwrap();
    let statements = v2.rebuild_table(&mut conn, "ledgers", model).expect("rebuild");
    assert!(statements >= 4);
    assert!(v2.validate(&mut conn).unwrap().is_empty());
    assert_eq!(common::count_rows(&mut conn, "ledgers"), 2);
    assert!(!existing_tables(&mut conn).unwrap().contains("ledgersOld"));
    // foreign keys restored afterwards
    common::assert_sqlite_pragmas(&mut conn);

    let missing = v2.rebuild_table(&mut conn, "nope", model).unwrap_err();
    assert!(matches!(missing, MigrationError::MissingTable(ref t) if t == "nope"));
}

#[test]
fn failed_rebuild_leaves_the_table_untouched() {
    let (_db, mut conn) = common::empty_db();
    Migrator::new([("ledgers", Arc::new(ledgers_v1()))], 1)
        .migrate(&mut conn)
        .expect("v1");
    conn.batch_execute("INSERT INTO ledgers (mts, amount) VALUES (1, 10.5);")
        .unwrap();

    // existing rows have no value for the new NOT NULL column
    let strict = SchemaModel::builder()
        .field("mts", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("note", SqlType::TextNotNull)
        .build()
        .expect("model");
    let migrator = Migrator::new([("ledgers", Arc::new(strict))], 2);
    let model = migrator.model("ledgers").unwrap();
    assert!(migrator.rebuild_table(&mut conn, "ledgers", model).is_err());

    assert_eq!(
        table_columns(&mut conn, "ledgers").unwrap(),
        vec!["_id", "mts", "amount"]
    );
    assert_eq!(common::count_rows(&mut conn, "ledgers"), 1);
    assert!(!existing_tables(&mut conn).unwrap().contains("ledgersOld"));
    common::assert_sqlite_pragmas(&mut conn);
}

#[test]
fn rebuilding_a_parent_keeps_child_references() {
    let (_db, mut conn) = common::setup_db();
    let user = common::seed_user(&mut conn, "a@example.com", false);
    conn.batch_execute(&format!(
        "INSERT INTO ledgers (id, mts, amount, user_id) VALUES (1, 100, 5, {user});"
    ))
    .unwrap();

    let migrator = Migrator::canonical().unwrap();
    let model = migrator.model(USERS).unwrap();
    migrator.rebuild_table(&mut conn, USERS, model).expect("rebuild users");
    assert_eq!(common::count_rows(&mut conn, USERS), 1);
    assert_eq!(common::count_rows(&mut conn, LEDGERS), 1);

    // the ledger FK still targets `users`, so the cascade still fires
    conn.batch_execute(&format!("DELETE FROM users WHERE _id = {user};")).unwrap();
    assert_eq!(common::count_rows(&mut conn, LEDGERS), 0);
}

#[test]
fn drop_all_resets_and_remigrates() {
    let (_db, mut conn) = common::setup_db();
    common::seed_user(&mut conn, "a@example.com", false);

    let migrator = Migrator::canonical().unwrap();
    let dropped = migrator.drop_all_tables(&mut conn, true).expect("drop");
    assert_eq!(dropped, migrator.models().count());
    assert!(existing_tables(&mut conn).unwrap().is_empty());
    assert_eq!(user_version(&mut conn).unwrap(), 0);
    common::assert_sqlite_pragmas(&mut conn);

    let report = migrator.migrate(&mut conn).expect("recreate");
    assert!(report.created_schema);
    assert_eq!(common::count_rows(&mut conn, USERS), 0);
}
