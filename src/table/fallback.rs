//! Schema-mismatch fallback
//!
//! When the configured table exists with different columns, results go to a
//! sibling named `<stem>_<N>.<ext>` instead of touching the old file. N is
//! one more than the largest numeric suffix present, or 2 when there is none,
//! so every mismatching run starts a fresh sibling.
//!
//! Suffix selection is a directory scan, not a lock: two runs racing to
//! create a fallback may pick the same N.

use super::ResultsTable;
use crate::coordinator::Leader;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Open `path`, falling back to a suffixed sibling on schema mismatch
pub fn open_with_fallback(leader: &Leader, path: &Path, columns: &[String]) -> Result<ResultsTable> {
    match ResultsTable::open(leader, path, columns) {
        Err(err) if err.is_schema_mismatch() && path.exists() => {
            warn!("{}", err);
            let fallback = next_suffix_path(path)?;
            info!("Writing results to {}", fallback.display());
            ResultsTable::open(leader, fallback, columns)
        }
        other => other,
    }
}

/// `<stem>_<N>.<ext>` for the next unused N
pub fn next_suffix_path(path: &Path) -> Result<PathBuf> {
    let next = suffixed_siblings(path)?
        .last()
        .map(|(n, _)| n + 1)
        .unwrap_or(2);
    Ok(with_suffix(path, next))
}

/// Siblings matching `<stem>_*.<ext>` with a numeric suffix, sorted by suffix
fn suffixed_siblings(path: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let (stem, ext) = stem_and_ext(path)?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let pattern = parent.join(format!("{}_*{}", glob::Pattern::escape(&stem), ext));
    let pattern = pattern.to_string_lossy();

    let entries = glob::glob(&pattern)
        .map_err(|e| Error::InvalidConfig(format!("bad table path pattern {}: {}", pattern, e)))?;

    let prefix = format!("{}_", stem);
    let mut found: Vec<(u64, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|candidate| {
            let name = candidate.file_name()?.to_str()?;
            let n = name.strip_prefix(&prefix)?.strip_suffix(&ext)?.parse::<u64>().ok()?;
            Some((n, candidate))
        })
        .collect();

    found.sort_by_key(|(n, _)| *n);
    Ok(found)
}

fn with_suffix(path: &Path, n: u64) -> PathBuf {
    let (stem, ext) = stem_and_ext(path).unwrap_or_default();
    path.with_file_name(format!("{}_{}{}", stem, n, ext))
}

/// File stem and dotted extension (`"table"`, `".csv"`)
fn stem_and_ext(path: &Path) -> Result<(String, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidConfig(format!("table path {} has no file name", path.display())))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    Ok((stem.to_string(), ext))
}
