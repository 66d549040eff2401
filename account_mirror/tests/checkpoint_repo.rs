use account_mirror::collections::{CANDLES_CONF, default_registry};
use account_mirror::schema::tables::{SYNC_RANGE_CHECKPOINTS, USERS};
use account_mirror::sync::{
    CheckpointRepo, CheckpointScope, FetchPass, RepoError, SqliteCheckpointRepo, SyncRangeCheckpoint,
    SyncRangeTracker,
};
use diesel::connection::SimpleConnection;

mod common;

#[test]
fn upsert_merges_within_a_scope_only() {
    let (_db, mut conn) = common::setup_db();
    let master = common::seed_user(&mut conn, "master@example.com", false);
    let sub = common::seed_user(&mut conn, "sub@example.com", true);
    let repo = SqliteCheckpointRepo::new();

    let user = CheckpointScope::user(master);
    let sub_scope = CheckpointScope::User {
        user_id: master,
        sub_user_id: Some(sub),
    };

    let first = repo
        .upsert(&mut conn, user, "ledgers", "_ALL", None, SyncRangeCheckpoint::base(100, 200))
        .expect("insert");
    assert_eq!(first, SyncRangeCheckpoint::base(100, 200));

    let merged = repo
        .upsert(&mut conn, user, "ledgers", "_ALL", None, SyncRangeCheckpoint::current(150, 400))
        .expect("merge");
    assert_eq!(
        merged,
        SyncRangeCheckpoint {
            base_start_from: Some(100),
            base_start_to: Some(200),
            curr_start: Some(150),
            curr_end: Some(400),
        }
    );

    repo.upsert(&mut conn, sub_scope, "ledgers", "_ALL", None, SyncRangeCheckpoint::base(1, 2))
        .expect("sub scope");
    repo.upsert(&mut conn, CheckpointScope::Global, "candles", "tBTCUSD", Some("1m"), SyncRangeCheckpoint::base(5, 9))
        .expect("global");

    assert_eq!(common::count_rows(&mut conn, SYNC_RANGE_CHECKPOINTS), 3);
    assert_eq!(
        repo.get(&mut conn, sub_scope, "ledgers", "_ALL", None).unwrap(),
        Some(SyncRangeCheckpoint::base(1, 2))
    );
    assert_eq!(
        repo.get(&mut conn, CheckpointScope::Global, "candles", "tBTCUSD", None).unwrap(),
        None
    );

    let global = repo.load(&mut conn, CheckpointScope::Global, "candles").unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].timeframe.as_deref(), Some("1m"));
    let own = repo.load(&mut conn, user, "ledgers").unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].timeframe, None);
}

#[test]
fn inconsistent_range_is_rejected_and_nothing_is_written() {
    let (_db, mut conn) = common::setup_db();
    let repo = SqliteCheckpointRepo::new();

    let err = repo
        .upsert(&mut conn, CheckpointScope::Global, "candles", "tBTCUSD", Some("1h"), SyncRangeCheckpoint::base(10, 5))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RepoError>(),
        Some(RepoError::InconsistentRange { .. })
    ));
    assert_eq!(common::count_rows(&mut conn, SYNC_RANGE_CHECKPOINTS), 0);
}

#[test]
fn deleting_a_user_cascades_to_its_checkpoints() {
    let (_db, mut conn) = common::setup_db();
    common::assert_sqlite_pragmas(&mut conn);
    let uid = common::seed_user(&mut conn, "gone@example.com", false);
    let repo = SqliteCheckpointRepo::new();

    repo.upsert(&mut conn, CheckpointScope::user(uid), "trades", "_ALL", None, SyncRangeCheckpoint::base(1, 2))
        .unwrap();
    repo.upsert(&mut conn, CheckpointScope::Global, "candles", "tETHUSD", Some("1D"), SyncRangeCheckpoint::base(1, 2))
        .unwrap();

    conn.batch_execute(&format!("DELETE FROM {USERS} WHERE _id = {uid};")).unwrap();
    assert_eq!(common::count_rows(&mut conn, SYNC_RANGE_CHECKPOINTS), 1);
}

#[test]
fn stored_checkpoints_drive_the_next_fetch_window() {
    let (_db, mut conn) = common::setup_db();
    let repo = SqliteCheckpointRepo::new();
    let tracker = SyncRangeTracker;
    let registry = default_registry().unwrap();
    let mut candles = registry.get("candles").unwrap().clone();
    assert_eq!(candles.conf_name.as_deref(), Some(CANDLES_CONF));

    repo.upsert(&mut conn, CheckpointScope::Global, "candles", "tBTCUSD", Some("1m"), SyncRangeCheckpoint::base(1_000, 2_000))
        .unwrap();
    for entry in repo.load(&mut conn, CheckpointScope::Global, "candles").unwrap() {
        tracker.merge_range_conf(&mut candles, &entry.symbol, entry.range, entry.timeframe.as_deref());
    }

    let cp = tracker.range_for(&candles, "tBTCUSD", Some("1m")).copied();
    let window = tracker.plan_fetch_window(cp.as_ref(), Some(0), 10_000).unwrap();
    assert_eq!((window.start, window.end, window.pass), (2_001, 10_000, FetchPass::Current));

    let fresh = tracker.plan_fetch_window(None, Some(500), 10_000).unwrap();
    assert_eq!((fresh.start, fresh.pass), (500, FetchPass::Base));
}
