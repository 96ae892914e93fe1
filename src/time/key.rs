//! Capture timestamp keys used as the first index level

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Key format: `YYYY-MM-DD_HH-MM-SS`
const KEY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Key used when no timestamp could be determined
pub const UNKNOWN_KEY: &str = "0000-00-00_00-00-00";

static KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn key_pattern() -> &'static Regex {
    KEY_PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}_[0-9]{2}-[0-9]{2}-[0-9]{2}$").expect("static key pattern")
    })
}

/// A capture timestamp rendered as an index key
///
/// The string form is kept as-is so that keys written by older snapshots
/// (including the all-zero sentinel, which is not a valid calendar date)
/// round-trip without normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimestampKey(String);

impl TimestampKey {
    /// Build a key from a resolved date/time
    pub fn from_datetime(timestamp: &NaiveDateTime) -> Self {
        Self(timestamp.format(KEY_FORMAT).to_string())
    }

    /// The "timestamp unknown" sentinel
    pub fn unknown() -> Self {
        Self(UNKNOWN_KEY.to_string())
    }

    /// Parse a key, returning `None` if it is not `YYYY-MM-DD_HH-MM-SS` shaped
    pub fn parse(s: &str) -> Option<Self> {
        key_pattern().is_match(s).then(|| Self(s.to_string()))
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_KEY
    }

    /// The four year digits
    pub fn year(&self) -> &str {
        &self.0[0..4]
    }

    /// The two month digits
    pub fn month(&self) -> &str {
        &self.0[5..7]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TimestampKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if key_pattern().is_match(&value) {
            Ok(Self(value))
        } else {
            Err(format!("malformed timestamp key '{}'", value))
        }
    }
}

impl From<TimestampKey> for String {
    fn from(key: TimestampKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_datetime() {
        let dt = NaiveDateTime::parse_from_str("2014-12-13 17:00:35", "%Y-%m-%d %H:%M:%S").unwrap();
        let key = TimestampKey::from_datetime(&dt);
        assert_eq!(key.as_str(), "2014-12-13_17-00-35");
        assert_eq!(key.year(), "2014");
        assert_eq!(key.month(), "12");
        assert!(!key.is_unknown());
    }

    #[test]
    fn test_unknown_sentinel() {
        let key = TimestampKey::unknown();
        assert_eq!(key.as_str(), "0000-00-00_00-00-00");
        assert_eq!(key.year(), "0000");
        assert_eq!(key.month(), "00");
        assert!(key.is_unknown());
        assert_eq!(TimestampKey::parse(UNKNOWN_KEY), Some(key));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TimestampKey::parse("2014-12-13 17:00:35").is_none());
        assert!(TimestampKey::parse("2014-12-13").is_none());
        assert!(TimestampKey::parse("abcd-12-13_17-00-35").is_none());
        assert!(TimestampKey::parse("").is_none());
        // Arabic-Indic digits are not ASCII digits
        assert!(TimestampKey::parse("٢٠١٤-١٢-١٣_١٧-٠٠-٣٥").is_none());
        assert!(TimestampKey::parse("2014-12-13_17-00-35").is_some());
    }

    #[test]
    fn test_serde_validation() {
        let key: TimestampKey = serde_json::from_str("\"2020-01-01_00-00-00\"").unwrap();
        assert_eq!(key.as_str(), "2020-01-01_00-00-00");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2020-01-01_00-00-00\"");

        let bad: std::result::Result<TimestampKey, _> = serde_json::from_str("\"yesterday\"");
        assert!(bad.is_err());
    }
}
