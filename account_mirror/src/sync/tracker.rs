use tracing::debug;

use super::{RangeEntry, SyncRangeCheckpoint};
use crate::collections::CollectionDescriptor;

/// Result of [`SyncRangeTracker::merge_range_conf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No entry existed for the key; the incoming range was appended.
    Inserted,
    /// An entry existed and was widened (`changed == false` when already covered).
    Merged {
        /// Whether any bound moved.
        changed: bool,
    },
}

/// Which pass a [`FetchWindow`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPass {
    /// First fill, from the configured start.
    Base,
    /// Catch-up past everything already covered.
    Current,
}

/// Inclusive millisecond window to request next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// First millisecond to fetch.
    pub start: i64,
    /// Last millisecond to fetch.
    pub end: i64,
    /// Pass the window extends.
    pub pass: FetchPass,
}

/// Keeps a collection's per-(symbol, timeframe) range list widened as fetches complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncRangeTracker;

impl SyncRangeTracker {
    /// Merge `incoming` into the entry for `(symbol, timeframe)`, appending when absent.
    pub fn merge_range_conf(
        &self,
        descriptor: &mut CollectionDescriptor,
        symbol: &str,
        incoming: SyncRangeCheckpoint,
        timeframe: Option<&str>,
    ) -> MergeOutcome {
        // lists hold tens of entries, a scan is enough
        match descriptor
            .start
            .iter_mut()
            .find(|e| e.matches(symbol, timeframe))
        {
            Some(entry) => {
                let changed = entry.range.merge_from(&incoming);
                debug!(collection = %descriptor.name, symbol, ?timeframe, changed, "range merged");
                MergeOutcome::Merged { changed }
            }
            None => {
                descriptor.start.push(RangeEntry {
                    symbol: symbol.to_string(),
                    timeframe: timeframe.map(str::to_string),
                    range: incoming,
                });
                debug!(collection = %descriptor.name, symbol, ?timeframe, "range inserted");
                MergeOutcome::Inserted
            }
        }
    }

    /// Current range for `(symbol, timeframe)`, if tracked.
    pub fn range_for<'a>(
        &self,
        descriptor: &'a CollectionDescriptor,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> Option<&'a SyncRangeCheckpoint> {
        descriptor
            .start
            .iter()
            .find(|e| e.matches(symbol, timeframe))
            .map(|e| &e.range)
    }

    /// Next window to fetch, or `None` when coverage already reaches `now`.
    ///
    /// Without any covered end the base pass starts at `conf_start` (or 0);
    /// otherwise the current pass resumes one millisecond past the widest end.
    pub fn plan_fetch_window(
        &self,
        checkpoint: Option<&SyncRangeCheckpoint>,
        conf_start: Option<i64>,
        now: i64,
    ) -> Option<FetchWindow> {
        let (start, pass) = match checkpoint.and_then(SyncRangeCheckpoint::widest_end) {
            Some(end) => (end.saturating_add(1), FetchPass::Current),
            None => (conf_start.unwrap_or(0), FetchPass::Base),
        };
        (start <= now).then_some(FetchWindow {
            start,
            end: now,
            pass,
        })
    }
}
