//! Utility functions for the ranked matchmaking core

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whole hours left until `ready_at`, rounded up, never negative
pub fn hours_until(now: DateTime<Utc>, ready_at: DateTime<Utc>) -> i64 {
    let seconds = (ready_at - now).num_seconds().max(0);
    (seconds + 3599) / 3600
}

/// Replace `path` with `bytes` without ever exposing a partial file.
///
/// The bytes go to a sibling `.tmp` file which is synced and then renamed over
/// the target.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)
}
