// On-disk history format and atomic replacement of the history file.
//
// One record per line, most recent first:
//
//     <command padded to width>  Used:<usage_count>  <unix seconds>

use crate::error::ShellError;
use crate::history::{HistoryItem, HistoryStore, SharedHistory};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

pub const DEFAULT_COLUMN_WIDTH: usize = 20;

const USED_MARKER: &str = "  Used:";

pub fn format_record(item: &HistoryItem, width: usize) -> String {
    format!(
        "{:<width$}{}{}  {}\n",
        item.command,
        USED_MARKER,
        item.usage_count,
        item.timestamp.timestamp(),
        width = width
    )
}

/// Parses one line written by [`format_record`].
///
/// The command is padded but never truncated, so fields are split from the
/// right: the timestamp is the last field and the last `Used:` marker ends the
/// command. Padding (and any trailing blanks of the command) is trimmed. The
/// directory is not part of the format and comes back empty.
pub fn parse_record(line: &str) -> Option<HistoryItem> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (rest, secs) = line.rsplit_once(' ')?;
    let secs: i64 = secs.parse().ok()?;
    let (command, count) = rest.trim_end().rsplit_once(USED_MARKER)?;
    let usage_count: usize = count.parse().ok().filter(|&c| c >= 1)?;
    let command = command.trim_end();
    if command.is_empty() {
        return None;
    }
    Some(HistoryItem {
        command: command.to_string(),
        directory: String::new(),
        timestamp: DateTime::<Utc>::from_timestamp(secs, 0)?,
        usage_count,
    })
}

/// Serializes every record, most recent first.
pub fn serialize(store: &HistoryStore, width: usize) -> String {
    store.iter().map(|item| format_record(item, width)).collect()
}

/// Rebuilds a store from serialized records. Malformed lines are skipped.
pub fn deserialize(content: &str, capacity: usize) -> HistoryStore {
    let mut items = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_record(line) {
            Some(item) => items.push(item),
            None => warn!("Skipping malformed history line {}: {:?}", lineno + 1, line),
        }
    }

    let mut store = HistoryStore::with_capacity(capacity);
    // Oldest first so the newest ends up at the front
    for item in items.into_iter().rev() {
        store.restore(item);
    }
    store
}

/// Loads a history file. A missing file yields an empty store.
pub fn load(path: &Path, capacity: usize) -> Result<HistoryStore> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(HistoryStore::with_capacity(capacity));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read history file {}", path.display()));
        }
    };
    let store = deserialize(&content, capacity);
    info!("Loaded {} history records from {}", store.len(), path.display());
    Ok(store)
}

/// Snapshots `history` under its lock and atomically replaces `path`.
pub fn persist(history: &SharedHistory, path: &Path, width: usize) -> Result<(), ShellError> {
    let snapshot = {
        let store = history.lock().unwrap_or_else(PoisonError::into_inner);
        serialize(&store, width)
    };
    write_atomic(path, snapshot.as_bytes()).map_err(|source| ShellError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `contents` to `<path>.tmp`, syncs it and renames it over `path`.
/// On failure the temporary file is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
