//! Relocation record persistence.
//!
//! The record is a small JSON file kept next to the parked executable. Reads are
//! permissive: a missing or unreadable record simply means no relocation is active.

use crate::model::RelocationRecord;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Load the record at `path`, treating a missing or malformed file as "no record".
pub fn load_record(path: &Path) -> Option<RelocationRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No relocation record at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read relocation record {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<RelocationRecord>(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Ignoring malformed relocation record {}: {}", path.display(), e);
            None
        }
    }
}

/// Write the record as 2-space indented JSON, creating the parent directory if needed.
pub fn save_record(path: &Path, record: &RelocationRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(record).context("serialize relocation record")?;

    // Write beside the target and rename so a crash never leaves a half-written record.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;

    debug!("Saved relocation record to {}", path.display());
    Ok(())
}

/// Delete the record. Returns `false` if there was nothing to delete.
pub fn delete_record(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("delete {}", path.display())),
    }
}

/// Build the record for a file that is about to be moved.
pub fn capture_record(source: &Path) -> RelocationRecord {
    RelocationRecord {
        original_path: Some(source.to_path_buf()),
        moved_at: file_timestamp(source),
    }
}

/// Creation time of the file as RFC 3339, falling back to modification time on
/// filesystems that do not track birth time.
fn file_timestamp(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    let when = meta.created().or_else(|_| meta.modified()).ok()?;
    time::OffsetDateTime::from(when)
        .format(&time::format_description::well_known::Rfc3339)
        .ok()
}
