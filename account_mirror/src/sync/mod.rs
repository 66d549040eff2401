//! Incremental sync bookkeeping: covered ranges, fetch planning, and the
//! stored-vs-fetched cutoff.

mod cutoff;
mod range;
pub mod repo;
mod tracker;

pub use cutoff::{cutoff_for_collection, resolve_fetch_cutoff};
pub use range::{ALL_SYMBOLS, RangeEntry, SyncRangeCheckpoint};
pub use repo::{CheckpointRepo, CheckpointScope, RepoError, SqliteCheckpointRepo};
pub use tracker::{FetchPass, FetchWindow, MergeOutcome, SyncRangeTracker};
