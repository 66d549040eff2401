use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::MigrationError;

// migration.v<version>[.<mts>].<ext>; non-numeric parts are filtered after matching
static MIGRATION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^migration\.v([^.]+)(?:\.([^.]+))?\.([^.]+)$").expect("Invalid regex pattern")
});

/// A directory entry as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    /// Bare file name.
    pub file_name: String,
    /// Full path, when read from disk.
    pub path: Option<PathBuf>,
    /// Regular file (directories and other entries are ignored).
    pub is_file: bool,
}

impl MigrationEntry {
    /// In-memory regular file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            file_name: name.into(),
            path: None,
            is_file: true,
        }
    }
}

/// A recognized migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// File name.
    pub name: String,
    /// Target schema version.
    pub version: u32,
    /// Creation timestamp (ms); 0 when absent.
    pub mts: i64,
    /// File extension.
    pub extension: String,
    /// Full path, when read from disk.
    pub path: Option<PathBuf>,
}

impl MigrationRecord {
    fn order(&self, other: &Self) -> Ordering {
        (self.version, self.mts).cmp(&(other.version, other.mts))
    }
}

fn parse_entry(entry: MigrationEntry) -> Option<MigrationRecord> {
    if !entry.is_file {
        return None;
    }
    let Some(caps) = MIGRATION_NAME.captures(&entry.file_name) else {
        debug!(name = %entry.file_name, "not a migration file, skipped");
        return None;
    };
    let Ok(version) = caps[1].parse::<u32>() else {
        debug!(name = %entry.file_name, "non-numeric migration version, skipped");
        return None;
    };
    let mts = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0);
    let extension = caps[3].to_string();

    Some(MigrationRecord {
        version,
        mts,
        extension,
        name: entry.file_name,
        path: entry.path,
    })
}

/// Recognized migrations sorted by `(version, mts)`.
///
/// Non-files, non-matching names and non-numeric versions are dropped.
pub fn discover_and_order(entries: impl IntoIterator<Item = MigrationEntry>) -> Vec<MigrationRecord> {
    let mut records: Vec<MigrationRecord> = entries.into_iter().filter_map(parse_entry).collect();
    // stable: equal keys keep directory order
    records.sort_by(MigrationRecord::order);
    records
}

/// Entries of `dir`, ready for [`discover_and_order`].
pub fn read_migration_dir(dir: &Path) -> Result<Vec<MigrationEntry>, MigrationError> {
    let io_err = |source| MigrationError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_file = entry.file_type().map_err(io_err)?.is_file();
        out.push(MigrationEntry {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: Some(entry.path()),
            is_file,
        });
    }
    Ok(out)
}
