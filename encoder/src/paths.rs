use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

fn fmt_ts(ms: i64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now);
    dt.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Path of a local recording started at `start_ms`.
/// e.g. "videos/20260218T093000000Z.mp4"
pub fn local_video_path(dir: &Path, start_ms: i64) -> PathBuf {
    dir.join(format!("{}.mp4", fmt_ts(start_ms)))
}
