//! Covered time envelopes per collection/symbol/timeframe.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Symbol key used by collections that are not split per symbol.
pub const ALL_SYMBOLS: &str = "_ALL";

/// Millisecond envelopes already synchronized for one key.
///
/// `base_*` tracks the first, backward-filling pass; `curr_*` the ongoing
/// forward-filling pass. `None` means the bound has not been observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRangeCheckpoint {
    /// Earliest start of the base pass.
    pub base_start_from: Option<i64>,
    /// Latest end of the base pass.
    pub base_start_to: Option<i64>,
    /// Earliest start of the current pass.
    pub curr_start: Option<i64>,
    /// Latest end of the current pass.
    pub curr_end: Option<i64>,
}

fn earliest(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    a.into_iter().chain(b).min()
}

fn latest(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    a.into_iter().chain(b).max()
}

impl SyncRangeCheckpoint {
    /// Base-pass envelope only.
    pub fn base(from: i64, to: i64) -> Self {
        Self {
            base_start_from: Some(from),
            base_start_to: Some(to),
            ..Self::default()
        }
    }

    /// Current-pass envelope only.
    pub fn current(start: i64, end: i64) -> Self {
        Self {
            curr_start: Some(start),
            curr_end: Some(end),
            ..Self::default()
        }
    }

    /// Read a loosely typed range; any bound that is not an integer is treated as unset.
    pub fn from_value(value: &Value) -> Self {
        let int = |key: &str| value.get(key).and_then(Value::as_i64);
        Self {
            base_start_from: int("baseStartFrom"),
            base_start_to: int("baseStartTo"),
            curr_start: int("currStart"),
            curr_end: int("currEnd"),
        }
    }

    /// Widen `self` by `other`: earliest starts, latest ends.
    ///
    /// A bound present on only one side wins; zero is a real bound.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            base_start_from: earliest(self.base_start_from, other.base_start_from),
            base_start_to: latest(self.base_start_to, other.base_start_to),
            curr_start: earliest(self.curr_start, other.curr_start),
            curr_end: latest(self.curr_end, other.curr_end),
        }
    }

    /// In-place [`merge`](Self::merge); returns whether anything changed.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        let merged = self.merge(other);
        let changed = merged != *self;
        *self = merged;
        changed
    }

    /// Both envelopes are ordered wherever both of their bounds are set.
    pub fn is_consistent(&self) -> bool {
        let ordered = |lo: Option<i64>, hi: Option<i64>| match (lo, hi) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        };
        ordered(self.base_start_from, self.base_start_to) && ordered(self.curr_start, self.curr_end)
    }

    /// No bound has been observed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Latest covered timestamp across both passes.
    pub fn widest_end(&self) -> Option<i64> {
        latest(self.base_start_to, self.curr_end)
    }
}

/// One tracked key inside a collection's `start` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    /// Symbol, or [`ALL_SYMBOLS`].
    pub symbol: String,
    /// Candle timeframe for collections that have one.
    pub timeframe: Option<String>,
    /// Covered envelopes.
    pub range: SyncRangeCheckpoint,
}

impl RangeEntry {
    /// Whether this entry is keyed by `(symbol, timeframe)`.
    pub fn matches(&self, symbol: &str, timeframe: Option<&str>) -> bool {
        self.symbol == symbol && self.timeframe.as_deref() == timeframe
    }
}
