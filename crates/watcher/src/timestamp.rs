//! Tolerant parsing of last-sync timestamps
//!
//! The record file is written by the sync action and has carried three
//! encodings over time: ISO-8601 strings (`T` or space separated, with or
//! without an offset), `YYYY-MM-DD HH:MM:SS` strings and epoch seconds (as a
//! number or a numeric string). Naive timestamps are in
//! local time. Anything unreadable counts as the epoch, which makes the
//! recorded path look stale rather than aborting the poll cycle.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

const ISO_OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const ISO_NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const PLAIN_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// A stored timestamp, or the epoch fallback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoredTimestamp {
    /// Seconds since the Unix epoch
    Parsed(f64),
    /// Unparsable entry; treated as epoch zero
    Default,
}

impl StoredTimestamp {
    /// Interpret one value of the record map
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(raw) => Self::parse(raw),
            Value::Number(n) => n
                .as_f64()
                .filter(|secs| secs.is_finite())
                .map(StoredTimestamp::Parsed)
                .unwrap_or(StoredTimestamp::Default),
            _ => StoredTimestamp::Default,
        }
    }

    /// Ordered fallback: ISO-8601, then `YYYY-MM-DD HH:MM:SS`, then a number
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        parse_iso(raw)
            .or_else(|| parse_plain(raw))
            .or_else(|| raw.parse::<f64>().ok().filter(|secs| secs.is_finite()))
            .map(StoredTimestamp::Parsed)
            .unwrap_or(StoredTimestamp::Default)
    }

    pub fn epoch_secs(self) -> f64 {
        match self {
            StoredTimestamp::Parsed(secs) => secs,
            StoredTimestamp::Default => 0.0,
        }
    }

    pub fn is_default(self) -> bool {
        matches!(self, StoredTimestamp::Default)
    }
}

fn parse_iso(raw: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()));
    }

    // Compact offsets such as `+0200`
    for format in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()));
        }
    }

    for format in ISO_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_secs(naive);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(local_secs)
}

fn parse_plain(raw: &str) -> Option<f64> {
    PLAIN_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(local_secs)
}

fn local_secs(naive: NaiveDateTime) -> Option<f64> {
    // Ambiguous local times (DST fold) resolve to the earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| epoch_secs(dt.timestamp(), dt.timestamp_subsec_nanos()))
}

fn epoch_secs(secs: i64, nanos: u32) -> f64 {
    secs as f64 + f64::from(nanos) / 1e9
}
