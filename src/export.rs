use crate::error::MonitorError;
use crate::store::EventLog;
use crate::types::LogEntry;
use chrono::Utc;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const CSV_HEADER: &str = "Timestamp,Event";

/// Builds the CSV document: header line, then one quoted row per entry.
pub fn to_csv(entries: &[LogEntry]) -> Result<String, MonitorError> {
    if entries.is_empty() {
        return Err(MonitorError::NothingToExport);
    }

    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + entries.len() * 48);
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        csv.push_str(&quote(&entry.timestamp));
        csv.push(',');
        csv.push_str(&quote(&entry.message));
        csv.push('\n');
    }

    Ok(csv)
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

pub fn file_name(epoch_ms: i64) -> String {
    format!("sitescope_log_{}.csv", epoch_ms)
}

/// Writes the visible entries of `log` into `dir`, returning the file path.
///
/// Nothing is written when no entry is visible.
pub fn export_visible(log: &EventLog, dir: &Path) -> Result<PathBuf, MonitorError> {
    let entries = log.list_visible();
    let csv = to_csv(&entries)?;

    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(Utc::now().timestamp_millis()));
    fs::write(&path, csv)?;

    info!("Exported {} log entries to {}", entries.len(), path.display());
    Ok(path)
}
