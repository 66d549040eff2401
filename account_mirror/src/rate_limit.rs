//! Sliding-window pacing of remote API calls, one window per method.
//!
//! A [`RateLimitChecker`] keeps the timestamps of calls made in the last
//! `period_ms`. Calls age out of the window; they are never evicted by count,
//! so a burst up to the ceiling is allowed and a quiet period restores capacity.
//! [`RateLimitRegistry`] owns one checker per method, created on first use.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default window: one minute.
pub const DEFAULT_PERIOD_MS: i64 = 60_000;

/// Wall-clock milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Per-window call ceiling of one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallCeiling {
    /// At most this many calls per window.
    Limited(u32),
    /// Never limited.
    Unlimited,
}

/// Rejected registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    /// `Limited(0)` would never admit a call.
    #[error("rate limit for {method} must allow at least one call per window")]
    ZeroCeiling {
        /// Method name, or `<default>` for the fallback ceiling.
        method: String,
    },
    /// Window length must be positive.
    #[error("rate limit period must be positive, got {0}ms")]
    NonPositivePeriod(i64),
}

const DEFAULT_CEILING_NAME: &str = "<default>";

fn check_ceiling(method: &str, ceiling: CallCeiling) -> Result<(), RateLimitError> {
    match ceiling {
        CallCeiling::Limited(0) => Err(RateLimitError::ZeroCeiling {
            method: method.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Sliding-window counter for a single method.
#[derive(Debug, Clone)]
pub struct RateLimitChecker {
    rate_limit: u32,
    period_ms: i64,
    calls: VecDeque<i64>,
}

impl RateLimitChecker {
    /// `rate_limit` calls per `period_ms`.
    pub fn new(rate_limit: u32, period_ms: i64) -> Self {
        Self {
            rate_limit,
            period_ms,
            calls: VecDeque::new(),
        }
    }

    /// Configured ceiling.
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    /// Calls currently inside the window (as of the last trim).
    pub fn in_window(&self) -> usize {
        self.calls.len()
    }

    // timestamps are appended in order, so expired ones form a prefix
    fn trim(&mut self, now: i64) {
        let cutoff = now - self.period_ms;
        while self.calls.front().is_some_and(|&t| t < cutoff) {
            self.calls.pop_front();
        }
    }

    /// Record a call at `now` and drop expired ones.
    pub fn record_call_at(&mut self, now: i64) {
        self.calls.push_back(now);
        self.trim(now);
    }

    /// Record a call now.
    pub fn record_call(&mut self) {
        self.record_call_at(now_ms());
    }

    /// Whether the window is full at `now`.
    pub fn is_at_limit_at(&mut self, now: i64) -> bool {
        self.trim(now);
        self.calls.len() >= self.rate_limit as usize
    }

    /// Whether the window is full now.
    pub fn is_at_limit(&mut self) -> bool {
        self.is_at_limit_at(now_ms())
    }

    /// Milliseconds until the oldest call leaves the window (0 when not at limit).
    pub fn wait_ms_at(&mut self, now: i64) -> i64 {
        if !self.is_at_limit_at(now) {
            return 0;
        }
        self.calls
            .front()
            .map_or(0, |&oldest| (oldest + self.period_ms + 1 - now).max(0))
    }
}

/// Lazily created checkers keyed by method name.
///
/// Constructor-injected; each instance is independent.
#[derive(Debug)]
pub struct RateLimitRegistry {
    period_ms: i64,
    ceilings: HashMap<String, CallCeiling>,
    default_ceiling: CallCeiling,
    checkers: Mutex<HashMap<String, RateLimitChecker>>,
}

impl Default for RateLimitRegistry {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            ceilings: HashMap::new(),
            default_ceiling: CallCeiling::Unlimited,
            checkers: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimitRegistry {
    /// Registry with per-method ceilings; unknown methods are unlimited.
    ///
    /// Fails on a non-positive period or a `Limited(0)` ceiling.
    pub fn new(period_ms: i64, ceilings: IndexMap<String, CallCeiling>) -> Result<Self, RateLimitError> {
        if period_ms <= 0 {
            return Err(RateLimitError::NonPositivePeriod(period_ms));
        }
        for (method, ceiling) in &ceilings {
            check_ceiling(method, *ceiling)?;
        }
        Ok(Self {
            period_ms,
            ceilings: ceilings.into_iter().collect(),
            ..Self::default()
        })
    }

    /// Ceiling applied to methods without an explicit entry.
    pub fn with_default_ceiling(mut self, ceiling: CallCeiling) -> Result<Self, RateLimitError> {
        check_ceiling(DEFAULT_CEILING_NAME, ceiling)?;
        self.default_ceiling = ceiling;
        Ok(self)
    }

    /// Effective ceiling of `method`.
    pub fn ceiling(&self, method: &str) -> CallCeiling {
        self.ceilings
            .get(method)
            .copied()
            .unwrap_or(self.default_ceiling)
    }

    fn lock_checkers(&self) -> MutexGuard<'_, HashMap<String, RateLimitChecker>> {
        self.checkers.lock().unwrap_or_else(|poisoned| {
            warn!("rate limit registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn with_checker<T>(
        &self,
        method: &str,
        limit: u32,
        f: impl FnOnce(&mut RateLimitChecker) -> T,
    ) -> T {
        let mut checkers = self.lock_checkers();
        let checker = checkers
            .entry(method.to_string())
            .or_insert_with(|| RateLimitChecker::new(limit, self.period_ms));
        f(checker)
    }

    /// Record a call to `method` at `now`.
    pub fn record_call_at(&self, method: &str, now: i64) {
        if let CallCeiling::Limited(limit) = self.ceiling(method) {
            self.with_checker(method, limit, |c| c.record_call_at(now));
        }
    }

    /// Whether `method` is at its ceiling at `now`.
    pub fn is_at_limit_at(&self, method: &str, now: i64) -> bool {
        match self.ceiling(method) {
            CallCeiling::Unlimited => false,
            CallCeiling::Limited(limit) => self.with_checker(method, limit, |c| c.is_at_limit_at(now)),
        }
    }

    /// Record immediately if there is room; otherwise how long to wait.
    fn try_acquire_at(&self, method: &str, now: i64) -> Option<Duration> {
        let CallCeiling::Limited(limit) = self.ceiling(method) else {
            return None;
        };
        self.with_checker(method, limit, |c| {
            if c.is_at_limit_at(now) {
                Some(Duration::from_millis(c.wait_ms_at(now).max(1).unsigned_abs()))
            } else {
                c.record_call_at(now);
                None
            }
        })
    }

    /// Wait until `method` has room in its window, then record the call.
    pub async fn acquire(&self, method: &str) {
        while let Some(wait) = self.try_acquire_at(method, now_ms()) {
            debug!(method, wait_ms = wait.as_millis() as u64, "rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}
