//! Video creation time via FFprobe

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Metadata keys to try for creation date
const CREATION_DATE_KEYS: &[&str] = &[
    "creation_time",
    "com.apple.quicktime.creationdate",
    "date",
    "date_recorded",
];

/// Cached FFprobe availability check
static FFPROBE_AVAILABLE: OnceLock<bool> = OnceLock::new();

fn is_ffprobe_available() -> bool {
    *FFPROBE_AVAILABLE.get_or_init(|| Command::new("ffprobe").arg("-version").output().is_ok())
}

/// Extract the creation time recorded in a video container
///
/// The value is taken as stored. QuickTime stores UTC and exiftool's
/// "Create Date" shows it unshifted, so no timezone correction is applied.
pub fn extract_video_time(path: &Path) -> Result<NaiveDateTime> {
    if !is_ffprobe_available() {
        return Err(Error::FfprobeNotFound);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::VideoMetadata {
            path: path.to_path_buf(),
            message: format!("Failed to execute ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(Error::VideoMetadata {
            path: path.to_path_buf(),
            message: format!(
                "FFprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ),
        });
    }

    let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| Error::VideoMetadata {
        path: path.to_path_buf(),
        message: format!("Failed to parse FFprobe JSON: {}", e),
    })?;
    trace!(?path, %json, "FFprobe output");

    find_creation_time(&json).ok_or_else(|| Error::VideoMetadata {
        path: path.to_path_buf(),
        message: "No creation time found in video metadata".to_string(),
    })
}

/// Search format tags first, then each stream's tags
fn find_creation_time(json: &Value) -> Option<NaiveDateTime> {
    if let Some(tags) = json.get("format").and_then(|f| f.get("tags"))
        && let Some(dt) = creation_time_in_tags(tags)
    {
        debug!("Found video creation time in format tags");
        return Some(dt);
    }

    json.get("streams")
        .and_then(|s| s.as_array())?
        .iter()
        .filter_map(|stream| stream.get("tags"))
        .find_map(creation_time_in_tags)
}

fn creation_time_in_tags(tags: &Value) -> Option<NaiveDateTime> {
    for key in CREATION_DATE_KEYS {
        for tag_key in [key.to_string(), key.to_uppercase()] {
            if let Some(dt) = tags
                .get(&tag_key)
                .and_then(|v| v.as_str())
                .and_then(parse_video_datetime)
            {
                return Some(dt);
            }
        }
    }
    None
}

/// Parse the datetime spellings FFprobe emits
///
/// Offsets are normalized to UTC; values without an offset are taken as-is.
pub(crate) fn parse_video_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S",
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_video_datetime() {
        let dt = parse_video_datetime("2024-01-15T14:30:00Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);

        let dt = parse_video_datetime("2024-01-15T14:30:00.123000Z").unwrap();
        assert_eq!(dt.minute(), 30);

        // 14:30 +08:00 = 06:30 UTC
        let dt = parse_video_datetime("2024-01-15T14:30:00+08:00").unwrap();
        assert_eq!(dt.hour(), 6);
        assert_eq!(dt.minute(), 30);

        let dt = parse_video_datetime("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.hour(), 14);

        assert!(parse_video_datetime("invalid").is_none());
    }

    #[test]
    fn test_find_creation_time_prefers_format_tags() {
        let json: Value = serde_json::json!({
            "format": { "tags": { "creation_time": "2014-12-13T17:00:35.000000Z" } },
            "streams": [ { "tags": { "creation_time": "2001-01-01T00:00:00Z" } } ]
        });
        let dt = find_creation_time(&json).unwrap();
        assert_eq!(dt.year(), 2014);
        assert_eq!(dt.second(), 35);
    }

    #[test]
    fn test_find_creation_time_in_stream() {
        let json: Value = serde_json::json!({
            "format": { "tags": { "encoder": "Lavf" } },
            "streams": [
                { "codec_type": "audio" },
                { "tags": { "CREATION_TIME": "2019-07-04 12:00:00" } }
            ]
        });
        let dt = find_creation_time(&json).unwrap();
        assert_eq!(dt.year(), 2019);
        assert_eq!(dt.month(), 7);
    }

    #[test]
    fn test_find_creation_time_missing() {
        let json: Value = serde_json::json!({ "format": {}, "streams": [] });
        assert!(find_creation_time(&json).is_none());
    }
}
