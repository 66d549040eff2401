#![allow(dead_code)]

use account_mirror::db::connection;
use account_mirror::db::schema::users;
use account_mirror::migrations::Migrator;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

/// Empty database file with connection PRAGMAs applied.
pub fn empty_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

/// Database migrated to the canonical schema.
pub fn setup_db() -> (TestDb, SqliteConnection) {
    let (db, mut conn) = empty_db();
    Migrator::canonical()
        .expect("models")
        .migrate(&mut conn)
        .expect("migrations");
    (db, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// Insert a user and return its `_id`.
pub fn seed_user(conn: &mut SqliteConnection, email: &str, is_sub_account: bool) -> i64 {
    diesel::insert_into(users::table)
        .values((
            users::email.eq(email),
            users::username.eq(email),
            users::is_sub_account.eq(i32::from(is_sub_account)),
        ))
        .returning(users::id)
        .get_result(conn)
        .expect("insert user")
}

pub fn count_rows(conn: &mut SqliteConnection, table: &str) -> i64 {
    let row: Count = diesel::sql_query(format!("SELECT COUNT(*) AS n FROM {table}"))
        .get_result(conn)
        .expect("count");
    row.n
}
