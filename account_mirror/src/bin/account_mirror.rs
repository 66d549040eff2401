use std::path::PathBuf;

use account_mirror::collections::{CollectionDescriptor, default_registry};
use account_mirror::config::{MirrorConfig, load_config_path};
use account_mirror::db::connection::connect_sqlite;
use account_mirror::migrations::Migrator;
use account_mirror::rate_limit::now_ms;
use account_mirror::sync::{CheckpointRepo, CheckpointScope, SqliteCheckpointRepo, SyncRangeTracker};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Account mirror database CLI")]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create or upgrade the schema.
    Migrate {
        /// Directory with migration.v<version>[.<mts>].sql files.
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Compare the live schema with the table models.
    Validate,
    /// Recreate a table from its model, keeping its rows.
    Rebuild { table: String },
    /// Drop every table and reset the schema version.
    DropAll {
        #[arg(long)]
        if_exists: bool,
    },
    /// List the mirrored collections.
    Collections {
        #[arg(long)]
        public: bool,
    },
    /// Show stored checkpoints of a collection and the next fetch window.
    Checkpoints {
        collection: String,
        /// Owner; omit for public collections.
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, requires = "user")]
        sub_user: Option<i64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => MirrorConfig::default(),
    };

    match cli.cmd {
        Cmd::Migrate { dir } => {
            let mut conn = connect_sqlite(&cfg.database_url()?)?;
            let mut migrator = Migrator::canonical()?;
            if let Some(dir) = dir.or_else(|| cfg.migrations_dir.clone()) {
                migrator = migrator.with_migrations_dir(dir);
            }
            let report = migrator.migrate(&mut conn)?;
            println!(
                "schema version {} -> {} ({} migration(s) applied{})",
                report.from_version,
                report.to_version,
                report.applied.len(),
                if report.created_schema { ", schema created" } else { "" }
            );
        }
        Cmd::Validate => {
            let mut conn = connect_sqlite(&cfg.database_url()?)?;
            let mismatches = Migrator::canonical()?.validate(&mut conn)?;
            for m in &mismatches {
                println!("{m}");
            }
            if !mismatches.is_empty() {
                bail!("{} schema mismatch(es)", mismatches.len());
            }
            println!("schema ok");
        }
        Cmd::Rebuild { table } => {
            let mut conn = connect_sqlite(&cfg.database_url()?)?;
            let migrator = Migrator::canonical()?;
            let model = migrator
                .model(&table)
                .with_context(|| format!("unknown table {table}"))?;
            let n = migrator.rebuild_table(&mut conn, &table, model)?;
            println!("{table}: {n} statement(s)");
        }
        Cmd::DropAll { if_exists } => {
            let mut conn = connect_sqlite(&cfg.database_url()?)?;
            let n = Migrator::canonical()?.drop_all_tables(&mut conn, if_exists)?;
            println!("dropped {n} table(s)");
        }
        Cmd::Collections { public } => {
            let registry = default_registry()?;
            let limits = cfg.rate_limit_registry()?;
            for d in registry.by_visibility(public) {
                println!(
                    "{:<22} {:<22} limit={:<5} calls={:?} start={}",
                    d.name,
                    d.api_method,
                    d.max_limit,
                    limits.ceiling(&d.api_method),
                    start_for(&cfg, d).map_or_else(|| "-".to_string(), |ms| ms.to_string()),
                );
            }
        }
        Cmd::Checkpoints {
            collection,
            user,
            sub_user,
        } => {
            let registry = default_registry()?;
            let descriptor = registry
                .get(&collection)
                .with_context(|| format!("unknown collection {collection}"))?;
            let scope = match user {
                Some(user_id) => CheckpointScope::User {
                    user_id,
                    sub_user_id: sub_user,
                },
                None => CheckpointScope::Global,
            };

            let mut conn = connect_sqlite(&cfg.database_url()?)?;
            let entries = SqliteCheckpointRepo::new().load(&mut conn, scope, &collection)?;
            let tracker = SyncRangeTracker;
            let now = now_ms();
            if entries.is_empty() {
                let next = tracker.plan_fetch_window(None, start_for(&cfg, descriptor), now);
                println!("no checkpoints; next window {next:?}");
            }
            let mut descriptor = descriptor.clone();
            for entry in entries {
                tracker.merge_range_conf(
                    &mut descriptor,
                    &entry.symbol,
                    entry.range,
                    entry.timeframe.as_deref(),
                );
            }
            for entry in &descriptor.start {
                let next = tracker.plan_fetch_window(
                    Some(&entry.range),
                    start_for(&cfg, &descriptor),
                    now,
                );
                println!(
                    "{} {} {:?} next={next:?}",
                    entry.symbol,
                    entry.timeframe.as_deref().unwrap_or("-"),
                    entry.range,
                );
            }
        }
    }

    Ok(())
}

fn start_for(cfg: &MirrorConfig, d: &CollectionDescriptor) -> Option<i64> {
    d.conf_name.as_deref().and_then(|c| cfg.sync_start_for(c))
}
