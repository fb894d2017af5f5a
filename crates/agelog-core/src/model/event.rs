//! A single recorded field transition and the timestamp formats it arrives in.
//!
//! Trackers log only *changes*: each history entry carries the instant it was
//! recorded and one or more `field: from -> to` items. A [`ChangeEvent`] is one
//! such item flattened together with its entry's timestamp.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recorded transition of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Instant the history entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Name of the changed field as logged (e.g. `status`, `project`).
    pub field: String,
    /// Value before the change, if the tracker recorded one.
    pub from_value: Option<String>,
    /// Value after the change, if the tracker recorded one.
    pub to_value: Option<String>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        field: impl Into<String>,
        from_value: Option<&str>,
        to_value: Option<&str>,
    ) -> Self {
        Self {
            timestamp,
            field: field.into(),
            from_value: from_value.map(str::to_string),
            to_value: to_value.map(str::to_string),
        }
    }

    #[must_use]
    pub fn is_field(&self, name: &str) -> bool {
        self.field == name
    }

    /// A transition into `closed`, from any prior state (including `closed`).
    #[must_use]
    pub fn closes(&self, closed: &str) -> bool {
        self.to_value.as_deref() == Some(closed)
    }

    /// A transition out of `closed` into anything else.
    ///
    /// The target status is not inspected beyond "not closed": intermediate
    /// workflow states count as a reopen too.
    #[must_use]
    pub fn reopens(&self, closed: &str) -> bool {
        self.from_value.as_deref() == Some(closed) && self.to_value.as_deref() != Some(closed)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{} -> {}",
            self.timestamp.to_rfc3339(),
            self.field,
            self.from_value.as_deref().unwrap_or("-"),
            self.to_value.as_deref().unwrap_or("-"),
        )
    }
}

/// Parse a tracker timestamp, keeping its original offset.
///
/// Accepts RFC 3339, the Jira style `2016-03-03T13:46:47.569-0700` (offset
/// without a colon), a bare local datetime (read as UTC) and a bare date
/// (midnight UTC). Anything else is `None`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().fixed_offset());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// [`parse_timestamp`] normalized to UTC.
#[must_use]
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(raw).map(|ts| ts.with_timezone(&Utc))
}

/// Midnight UTC at the start of `date`, the instant a calendar day is queried at.
#[must_use]
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn parses_jira_offset_without_colon() {
        let ts = parse_timestamp("2016-03-03T13:46:47.569-0700").expect("should parse");
        assert_eq!(ts.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(ts.with_timezone(&Utc), utc(2016, 3, 3, 20, 46, 47) + chrono::Duration::milliseconds(569));
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_utc("2026-01-01T00:00:00Z").expect("should parse");
        assert_eq!(ts, utc(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn parses_bare_date_as_midnight_utc() {
        let ts = parse_utc("2016-03-03").expect("should parse");
        assert_eq!(ts, utc(2016, 3, 3, 0, 0, 0));
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn parses_bare_datetime_as_utc() {
        let ts = parse_utc("2016-03-03T10:15:00").expect("should parse");
        assert_eq!(ts, utc(2016, 3, 3, 10, 15, 0));
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("   ").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2016-13-45").is_none());
    }

    #[test]
    fn reopen_requires_leaving_closed() {
        let at = utc(2016, 3, 10, 0, 0, 0);
        assert!(ChangeEvent::new(at, "status", Some("Closed"), Some("In Progress")).reopens("Closed"));
        assert!(!ChangeEvent::new(at, "status", Some("Closed"), Some("Closed")).reopens("Closed"));
        assert!(!ChangeEvent::new(at, "status", Some("Open"), Some("In Progress")).reopens("Closed"));
        assert!(!ChangeEvent::new(at, "status", None, Some("Open")).reopens("Closed"));
    }

    #[test]
    fn closed_to_closed_still_closes() {
        let at = utc(2016, 3, 10, 0, 0, 0);
        assert!(ChangeEvent::new(at, "status", Some("Closed"), Some("Closed")).closes("Closed"));
        assert!(ChangeEvent::new(at, "status", Some("Open"), Some("Closed")).closes("Closed"));
        assert!(!ChangeEvent::new(at, "status", Some("Closed"), Some("Open")).closes("Closed"));
    }

    #[test]
    fn day_start_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2015, 1, 2).expect("valid date");
        assert_eq!(day_start(date), utc(2015, 1, 2, 0, 0, 0));
    }

    #[test]
    fn display_marks_absent_values() {
        let event = ChangeEvent::new(utc(2016, 3, 10, 0, 0, 0), "Sprint Team", None, Some("team 2"));
        let shown = event.to_string();
        assert!(shown.contains("Sprint Team"));
        assert!(shown.contains("- -> team 2"));
    }
}
