//! Mirror configuration: parsing, normalization, and loading.
//!
//! ```toml
//! database_url = "mirror.db"
//! migrations_dir = "migrations"
//!
//! [rate_limits]
//! period_ms = 60000
//! [rate_limits.methods]
//! getLedgers = 90
//! getCandles = "unlimited"
//!
//! [sync_start]
//! candlesConf = 1577836800000
//! ```
//!
//! TOML has no null, so `"unlimited"` marks a method that is never paced.
//! Environment variables override the file:
//! - `ACCOUNT_MIRROR_DATABASE_URL` replaces `database_url`;
//! - `ACCOUNT_MIRROR_RATE_PERIOD_MS` replaces `rate_limits.period_ms`.

use std::collections::HashSet;
use std::mem;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_var_opt, parse_env_var_or};

use crate::rate_limit::{CallCeiling, DEFAULT_PERIOD_MS, RateLimitRegistry};

/// Overrides `database_url`.
pub const DATABASE_URL_ENV: &str = "ACCOUNT_MIRROR_DATABASE_URL";
/// Overrides `rate_limits.period_ms`.
pub const RATE_PERIOD_ENV: &str = "ACCOUNT_MIRROR_RATE_PERIOD_MS";

const UNLIMITED: &str = "unlimited";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// SQLite path or `sqlite:` URL.
    pub database_url: Option<String>,
    /// Directory holding `migration.v<version>[.<mts>].sql` files.
    pub migrations_dir: Option<PathBuf>,
    /// Per-method call pacing.
    #[serde(default)]
    pub rate_limits: RateLimitsCfg,
    /// Start-date overrides (ms) keyed by collection `conf_name`.
    #[serde(default)]
    pub sync_start: IndexMap<String, i64>,
}

/// `[rate_limits]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitsCfg {
    /// Window length in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: i64,
    /// Method name -> ceiling.
    #[serde(default)]
    pub methods: IndexMap<String, CeilingCfg>,
}

impl Default for RateLimitsCfg {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            methods: IndexMap::new(),
        }
    }
}

fn default_period_ms() -> i64 {
    DEFAULT_PERIOD_MS
}

/// Authored ceiling: a call count or the `"unlimited"` keyword.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CeilingCfg {
    /// Calls per window.
    Count(i64),
    /// Keyword; only `"unlimited"` survives normalization.
    Keyword(String),
}

impl CeilingCfg {
    fn to_ceiling(&self) -> Option<CallCeiling> {
        match self {
            CeilingCfg::Count(n) => u32::try_from(*n).ok().filter(|n| *n > 0).map(CallCeiling::Limited),
            CeilingCfg::Keyword(k) if k == UNLIMITED => Some(CallCeiling::Unlimited),
            CeilingCfg::Keyword(_) => None,
        }
    }
}

impl RateLimitsCfg {
    /// Normalized ceilings. Entries that do not convert are skipped; run
    /// [`normalize_config`] first to reject them instead.
    pub fn ceilings(&self) -> IndexMap<String, CallCeiling> {
        self.methods
            .iter()
            .filter_map(|(m, c)| c.to_ceiling().map(|c| (m.clone(), c)))
            .collect()
    }
}

impl MirrorConfig {
    /// Database URL, environment first.
    pub fn database_url(&self) -> anyhow::Result<String> {
        if let Some(url) = get_env_var_opt(DATABASE_URL_ENV) {
            return Ok(url);
        }
        self.database_url
            .clone()
            .with_context(|| format!("no database_url configured and {DATABASE_URL_ENV} is unset"))
    }

    /// Start override for a collection's `conf_name`.
    pub fn sync_start_for(&self, conf_name: &str) -> Option<i64> {
        self.sync_start.get(conf_name).copied()
    }

    /// Fresh registry for the configured ceilings.
    pub fn rate_limit_registry(&self) -> anyhow::Result<RateLimitRegistry> {
        let period = parse_env_var_or(RATE_PERIOD_ENV, self.rate_limits.period_ms)?;
        if period <= 0 {
            bail!("{RATE_PERIOD_ENV} must be positive, got {period}");
        }
        RateLimitRegistry::new(period, self.rate_limits.ceilings()).context("invalid rate limit settings")
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Method names changed by trimming.
    pub methods_renamed: usize,
    /// Method entries dropped as duplicates (first occurrence wins).
    pub methods_deduped: usize,
    /// Keywords rewritten to their canonical spelling.
    pub keywords_normalized: usize,
    /// Start overrides dropped as duplicates.
    pub sync_start_deduped: usize,
}

/// Normalize a config in place.
///
/// - trims method names and `sync_start` keys, keeping the first of any duplicates
/// - lowercases/trims keywords; anything but `"unlimited"` is an error
/// - rejects non-positive ceilings, a non-positive period and negative start dates
pub fn normalize_config(cfg: &mut MirrorConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    if cfg.rate_limits.period_ms <= 0 {
        bail!("rate_limits.period_ms must be positive, got {}", cfg.rate_limits.period_ms);
    }

    let mut methods = IndexMap::new();
    for (raw_name, ceiling) in mem::take(&mut cfg.rate_limits.methods) {
        let name = raw_name.trim().to_string();
        if name.is_empty() {
            bail!("rate limit method name cannot be empty after trimming");
        }
        if name != raw_name {
            report.methods_renamed += 1;
        }
        if methods.contains_key(&name) {
            report.methods_deduped += 1;
            continue;
        }

        let ceiling = match ceiling {
            CeilingCfg::Count(n) if n <= 0 || u32::try_from(n).is_err() => {
                bail!("rate limit for {name} must be a positive 32-bit count, got {n}");
            }
            CeilingCfg::Keyword(k) => {
                let norm = k.trim().to_lowercase();
                if norm != UNLIMITED {
                    bail!("unknown rate limit keyword {k:?} for {name}");
                }
                if norm != k {
                    report.keywords_normalized += 1;
                }
                CeilingCfg::Keyword(norm)
            }
            count => count,
        };
        methods.insert(name, ceiling);
    }
    cfg.rate_limits.methods = methods;

    let mut seen = HashSet::new();
    let mut starts = IndexMap::new();
    for (raw_key, ms) in mem::take(&mut cfg.sync_start) {
        let key = raw_key.trim().to_string();
        if key.is_empty() {
            bail!("sync_start key cannot be empty after trimming");
        }
        if ms < 0 {
            bail!("sync_start.{key} must not be negative, got {ms}");
        }
        if seen.insert(key.clone()) {
            starts.insert(key, ms);
        } else {
            report.sync_start_deduped += 1;
        }
    }
    cfg.sync_start = starts;

    Ok(report)
}

/// Parse and normalize a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<MirrorConfig> {
    let mut cfg: MirrorConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    let report = normalize_config(&mut cfg).context("normalize_config failed")?;
    tracing::debug!(?report, "config normalized");
    Ok(cfg)
}

/// Read, parse and normalize a config file.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<MirrorConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
