//! Checkpoint persistence (SQLite).
//!
//! One row per `(scope, collection, symbol, timeframe)`. Writes always merge
//! with the stored envelope so concurrent sync steps can only widen coverage.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use tracing::debug;

use super::{RangeEntry, SyncRangeCheckpoint};
use crate::db::schema::sync_range_checkpoints::{self, dsl as src};

/// Errors raised by a [`CheckpointRepo`].
#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    /// The merged envelope would have a start after its end.
    #[error("inconsistent range for {collection}/{symbol}: {range:?}")]
    InconsistentRange {
        /// Collection name.
        collection: String,
        /// Symbol key.
        symbol: String,
        /// Offending merged range.
        range: SyncRangeCheckpoint,
    },
}

/// Result type used by checkpoint repositories.
pub type RepoResult<T> = anyhow::Result<T>;

/// Who a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointScope {
    /// Public collections, shared by every user.
    Global,
    /// A user, or one of its sub-accounts.
    User {
        /// `users._id` of the owner.
        user_id: i64,
        /// `users._id` of the sub-account, if any.
        sub_user_id: Option<i64>,
    },
}

impl CheckpointScope {
    /// Scope of a master (non-sub) account.
    pub fn user(user_id: i64) -> Self {
        CheckpointScope::User {
            user_id,
            sub_user_id: None,
        }
    }
}

/// Storage surface for checkpoints; SQLite implementation below.
pub trait CheckpointRepo {
    /// Every tracked key of `collection` in `scope`.
    fn load(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
    ) -> RepoResult<Vec<RangeEntry>>;

    /// Stored range for one key.
    fn get(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> RepoResult<Option<SyncRangeCheckpoint>>;

    /// Merge `range` into the stored checkpoint (creating it) and return the result.
    fn upsert(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
        symbol: &str,
        timeframe: Option<&str>,
        range: SyncRangeCheckpoint,
    ) -> RepoResult<SyncRangeCheckpoint>;
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = sync_range_checkpoints)]
#[diesel(check_for_backend(Sqlite))]
struct CheckpointRow {
    id: i64,
    symbol: String,
    timeframe: String,
    base_start_from: Option<i64>,
    base_start_to: Option<i64>,
    curr_start: Option<i64>,
    curr_end: Option<i64>,
}

impl CheckpointRow {
    fn range(&self) -> SyncRangeCheckpoint {
        SyncRangeCheckpoint {
            base_start_from: self.base_start_from,
            base_start_to: self.base_start_to,
            curr_start: self.curr_start,
            curr_end: self.curr_end,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = sync_range_checkpoints)]
struct NewCheckpoint<'a> {
    user_id: Option<i64>,
    sub_user_id: Option<i64>,
    coll_name: &'a str,
    symbol: &'a str,
    timeframe: &'a str,
    base_start_from: Option<i64>,
    base_start_to: Option<i64>,
    curr_start: Option<i64>,
    curr_end: Option<i64>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

// no timeframe is stored as '' so the column can take part in unique indexes
fn timeframe_column(timeframe: Option<&str>) -> &str {
    timeframe.unwrap_or("")
}

fn scoped(
    scope: CheckpointScope,
    collection: &str,
) -> sync_range_checkpoints::BoxedQuery<'_, Sqlite> {
    let q = src::sync_range_checkpoints
        .filter(src::coll_name.eq(collection))
        .into_boxed();
    match scope {
        CheckpointScope::Global => q.filter(src::user_id.is_null()),
        CheckpointScope::User {
            user_id,
            sub_user_id: None,
        } => q
            .filter(src::user_id.eq(user_id))
            .filter(src::sub_user_id.is_null()),
        CheckpointScope::User {
            user_id,
            sub_user_id: Some(sub),
        } => q
            .filter(src::user_id.eq(user_id))
            .filter(src::sub_user_id.eq(sub)),
    }
}

fn find_row(
    conn: &mut SqliteConnection,
    scope: CheckpointScope,
    collection: &str,
    symbol: &str,
    timeframe: Option<&str>,
) -> QueryResult<Option<CheckpointRow>> {
    scoped(scope, collection)
        .filter(src::symbol.eq(symbol))
        .filter(src::timeframe.eq(timeframe_column(timeframe)))
        .select(CheckpointRow::as_select())
        .first(conn)
        .optional()
}

/// SQLite-backed [`CheckpointRepo`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteCheckpointRepo;

impl SqliteCheckpointRepo {
    /// New repository handle.
    pub fn new() -> Self {
        Self
    }
}

impl CheckpointRepo for SqliteCheckpointRepo {
    fn load(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
    ) -> RepoResult<Vec<RangeEntry>> {
        let rows: Vec<CheckpointRow> = scoped(scope, collection)
            .order(src::id.asc())
            .select(CheckpointRow::as_select())
            .load(conn)?;

        Ok(rows
            .into_iter()
            .map(|row| RangeEntry {
                range: row.range(),
                timeframe: (!row.timeframe.is_empty()).then_some(row.timeframe),
                symbol: row.symbol,
            })
            .collect())
    }

    fn get(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> RepoResult<Option<SyncRangeCheckpoint>> {
        Ok(find_row(conn, scope, collection, symbol, timeframe)?.map(|r| r.range()))
    }

    fn upsert(
        &self,
        conn: &mut SqliteConnection,
        scope: CheckpointScope,
        collection: &str,
        symbol: &str,
        timeframe: Option<&str>,
        range: SyncRangeCheckpoint,
    ) -> RepoResult<SyncRangeCheckpoint> {
        conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            let now = Utc::now().timestamp_millis();
            let existing = find_row(conn, scope, collection, symbol, timeframe)?;
            let merged = existing
                .as_ref()
                .map_or(range, |row| row.range().merge(&range));

            if !merged.is_consistent() {
                return Err(RepoError::InconsistentRange {
                    collection: collection.to_string(),
                    symbol: symbol.to_string(),
                    range: merged,
                }
                .into());
            }

            match existing {
                Some(row) => {
                    diesel::update(src::sync_range_checkpoints.find(row.id))
                        .set((
                            src::base_start_from.eq(merged.base_start_from),
                            src::base_start_to.eq(merged.base_start_to),
                            src::curr_start.eq(merged.curr_start),
                            src::curr_end.eq(merged.curr_end),
                            src::updated_at.eq(Some(now)),
                        ))
                        .execute(conn)?;
                }
                None => {
                    let (user_id, sub_user_id) = match scope {
                        CheckpointScope::Global => (None, None),
                        CheckpointScope::User {
                            user_id,
                            sub_user_id,
                        } => (Some(user_id), sub_user_id),
                    };
                    diesel::insert_into(src::sync_range_checkpoints)
                        .values(&NewCheckpoint {
                            user_id,
                            sub_user_id,
                            coll_name: collection,
                            symbol,
                            timeframe: timeframe_column(timeframe),
                            base_start_from: merged.base_start_from,
                            base_start_to: merged.base_start_to,
                            curr_start: merged.curr_start,
                            curr_end: merged.curr_end,
                            created_at: Some(now),
                            updated_at: Some(now),
                        })
                        .execute(conn)?;
                }
            }

            debug!(collection, symbol, ?timeframe, ?scope, range = ?merged, "checkpoint stored");
            Ok(merged)
        })
    }
}
