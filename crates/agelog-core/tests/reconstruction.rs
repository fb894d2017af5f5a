//! Point-in-time reconstruction against changelog-shaped issue records.
//!
//! Covers: reopen detection, closed -> closed changes, next-close ordering
//! independent of changelog order, age while open, project and team lookups
//! before and after a change, and fallback to current values.

use agelog_core::model::event::{day_start, parse_utc};
use agelog_core::{IssueHistory, RawIssue};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{Value, json};

const CREATED: &str = "2016-03-03T13:46:47.569-0700";
const CHANGED: &str = "2016-03-10T13:46:47.569-0700";

fn ts(raw: &str) -> DateTime<Utc> {
    parse_utc(raw).expect("fixture timestamp must parse")
}

fn day(raw: &str) -> DateTime<Utc> {
    day_start(NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("fixture date"))
}

fn history(value: Value) -> IssueHistory {
    IssueHistory::new(&RawIssue::new(value))
}

fn status_change(at: &str, from: &str, to: &str) -> Value {
    json!({
        "created": at,
        "items": [{ "field": "status", "fromString": from, "toString": to }]
    })
}

// ---------------------------------------------------------------------------
// last_opened
// ---------------------------------------------------------------------------

fn reopened_issue(to_status: &str) -> IssueHistory {
    history(json!({
        "fields": { "created": CREATED },
        "changelog": { "histories": [status_change(CHANGED, "Closed", to_status)] }
    }))
}

#[test]
fn last_opened_defaults_to_creation_without_reopens() {
    let issue = history(json!({
        "fields": { "created": CREATED },
        "changelog": { "histories": [] }
    }));
    assert_eq!(issue.last_opened(day("2016-03-04")), Some(ts(CREATED)));
}

#[test]
fn last_opened_finds_latest_move_out_of_closed() {
    let issue = reopened_issue("Some Status");
    assert_eq!(issue.last_opened(day("2016-03-12")), Some(ts(CHANGED)));
    assert_eq!(issue.last_opened(day("2016-03-05")), Some(ts(CREATED)));
}

#[test]
fn last_opened_is_absent_before_creation() {
    assert_eq!(reopened_issue("Some Status").last_opened(day("2016-03-01")), None);
}

#[test]
fn closed_to_closed_is_not_a_reopen() {
    let issue = reopened_issue("Closed");
    assert_eq!(issue.last_opened(day("2016-03-12")), Some(ts(CREATED)));
}

// ---------------------------------------------------------------------------
// next_closed
// ---------------------------------------------------------------------------

#[test]
fn next_closed_ignores_changelog_order() {
    let later = "2016-03-03T13:46:47.569-0700";
    let earlier = "2016-03-01T13:46:47.569-0700";
    let issue = history(json!({
        "changelog": {
            "histories": [
                status_change(later, "Some Date", "Closed"),
                status_change(earlier, "Some Date", "Closed"),
            ]
        }
    }));

    assert_eq!(issue.next_closed(day("2016-03-02")), Some(ts(later)));
    assert_eq!(issue.next_closed(day("2016-02-02")), Some(ts(earlier)));
    assert_eq!(issue.next_closed(day("2016-03-05")), None);
}

// ---------------------------------------------------------------------------
// age_on
// ---------------------------------------------------------------------------

fn shelved_then_reopened() -> IssueHistory {
    history(json!({
        "fields": { "created": "2016-03-03" },
        "changelog": {
            "histories": [
                {
                    "created": "2016-03-05",
                    "items": [
                        { "field": "resolution", "fromString": "", "toString": "Shelved" },
                        { "field": "status", "fromString": "Open", "toString": "Closed" }
                    ]
                },
                status_change("2016-03-10", "Closed", "In Progress"),
                status_change("2016-03-15", "In Progress", "Closed"),
            ]
        }
    }))
}

#[test]
fn age_counts_days_since_last_opening() {
    let issue = shelved_then_reopened();
    assert_eq!(issue.age_on(day("2016-03-04")), Some(1.0));
    assert_eq!(issue.age_on(day("2016-03-12")), Some(2.0));
}

#[test]
fn age_is_absent_while_closed() {
    let issue = shelved_then_reopened();
    assert_eq!(issue.age_on(day("2016-03-06")), None);
    assert_eq!(issue.age_on(day("2016-03-16")), None);
    assert!(issue.state_on(day("2016-03-16")).is_none());
}

#[test]
fn age_is_absent_before_creation() {
    assert_eq!(shelved_then_reopened().age_on(day("2016-03-02")), None);
}

#[test]
fn age_is_fractional_within_a_day() {
    let issue = history(json!({ "fields": { "created": "2016-03-03T00:00:00Z" } }));
    let noon = day("2016-03-04") + Duration::hours(12);
    assert_eq!(issue.age_on(noon), Some(1.5));
    assert_eq!(issue.is_open_on(noon), Some(1.5));
}

#[test]
fn missing_creation_makes_every_query_absent() {
    let issue = history(json!({
        "fields": { "project": { "name": "Canvas" } },
        "changelog": { "histories": [status_change(CHANGED, "Closed", "Open")] }
    }));
    assert_eq!(issue.age_on(day("2016-03-12")), None);
    assert_eq!(issue.project_on(day("2016-03-12")), None);
    assert_eq!(issue.team_on(day("2016-03-12")), None);
}

// ---------------------------------------------------------------------------
// project_on / team_on
// ---------------------------------------------------------------------------

fn moved_project() -> Value {
    json!({
        "fields": { "created": CREATED, "project": { "name": "Canvas" } },
        "changelog": {
            "histories": [{
                "created": CHANGED,
                "items": [{ "field": "project", "fromString": "Some Project", "toString": "Canvas" }]
            }]
        }
    })
}

#[test]
fn project_on_follows_the_changelog() {
    let issue = history(moved_project());
    assert_eq!(issue.project_on(ts(CREATED) + Duration::days(1)), Some("Some Project"));
    assert_eq!(issue.project_on(ts(CHANGED) + Duration::days(1)), Some("Canvas"));
}

#[test]
fn project_on_is_absent_before_creation() {
    let issue = history(moved_project());
    assert_eq!(issue.project_on(ts(CREATED) - Duration::days(1)), None);
}

#[test]
fn project_on_falls_back_to_current_value() {
    let mut value = moved_project();
    value["changelog"]["histories"] = json!([]);
    let issue = history(value);
    assert_eq!(issue.project_on(ts(CREATED) + Duration::days(1)), Some("Canvas"));
}

#[test]
fn query_at_transition_instant_sees_new_value() {
    let issue = history(moved_project());
    assert_eq!(issue.project_on(ts(CHANGED)), Some("Canvas"));
}

fn moved_team(current: Value) -> Value {
    json!({
        "fields": { "created": CREATED, "customfield_12700": current },
        "changelog": {
            "histories": [{
                "created": CHANGED,
                "items": [{ "field": "Sprint Team", "fromString": "team 1", "toString": "team 2" }]
            }]
        }
    })
}

#[test]
fn team_on_follows_the_changelog() {
    let issue = history(moved_team(json!({ "value": "team 2" })));
    assert_eq!(issue.team_on(ts(CREATED) + Duration::days(1)), Some("team 1"));
    assert_eq!(issue.team_on(ts(CHANGED) + Duration::days(1)), Some("team 2"));
    assert_eq!(issue.team_on(ts(CREATED) - Duration::days(1)), None);
}

#[test]
fn team_on_falls_back_to_current_value() {
    let mut value = moved_team(json!({ "value": "team 2" }));
    value["changelog"]["histories"] = json!([]);
    let issue = history(value);
    assert_eq!(issue.team_on(ts(CREATED) + Duration::days(1)), Some("team 2"));
}

#[test]
fn team_on_is_absent_without_a_team() {
    let issue = history(moved_team(Value::Null));
    assert_eq!(issue.team_on(ts(CHANGED) + Duration::days(1)), None);
}

#[test]
fn blank_from_value_reads_as_absent() {
    let issue = history(json!({
        "fields": { "created": CREATED, "customfield_12700": { "value": "team 2" } },
        "changelog": {
            "histories": [{
                "created": CHANGED,
                "items": [{ "field": "Sprint Team", "fromString": "", "toString": "team 2" }]
            }]
        }
    }));
    assert_eq!(issue.team_on(ts(CREATED) + Duration::days(1)), None);
}

#[test]
fn state_on_bundles_age_project_and_team() {
    let issue = history(json!({
        "fields": {
            "created": "2016-03-01T00:00:00Z",
            "project": { "name": "Canvas" },
            "customfield_12700": { "value": "team 2" }
        }
    }));
    let state = issue.state_on(day("2016-03-04")).expect("open on the 4th");
    assert_eq!(state.age_days, 3.0);
    assert_eq!(state.project, Some("Canvas"));
    assert_eq!(state.team, Some("team 2"));
}

#[test]
fn repeated_queries_are_stable() {
    let issue = shelved_then_reopened();
    let first: Vec<_> = (1..=20)
        .map(|d| issue.age_on(day(&format!("2016-03-{d:02}"))))
        .collect();
    let second: Vec<_> = (1..=20)
        .map(|d| issue.age_on(day(&format!("2016-03-{d:02}"))))
        .collect();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// undated changelog entries
// ---------------------------------------------------------------------------

#[test]
fn undated_status_change_makes_age_absent() {
    let issue = history(json!({
        "fields": { "created": "2016-01-01T12:00:00Z", "project": { "name": "Canvas" } },
        "changelog": { "histories": [status_change("not-a-date", "Open", "Closed")] }
    }));
    assert!(issue.age_on(day("2016-03-01")).is_none());
    assert!(issue.state_on(day("2016-03-01")).is_none());
    assert_eq!(issue.project_on(day("2016-03-01")), Some("Canvas"));
}

#[test]
fn undated_project_change_only_affects_project() {
    let issue = history(json!({
        "fields": {
            "created": "2016-01-01T00:00:00Z",
            "project": { "name": "Canvas" },
            "customfield_12700": { "value": "team 2" }
        },
        "changelog": {
            "histories": [{
                "items": [{ "field": "project", "fromString": "Triage", "toString": "Canvas" }]
            }]
        }
    }));
    let on = day("2016-01-05");
    assert_eq!(issue.project_on(on), None);
    assert_eq!(issue.team_on(on), Some("team 2"));
    assert_eq!(issue.age_on(on), Some(4.0));
}

#[test]
fn undated_team_change_makes_team_absent() {
    let issue = history(json!({
        "fields": { "created": "2016-01-01T00:00:00Z", "customfield_12700": { "value": "team 2" } },
        "changelog": {
            "histories": [{
                "created": "",
                "items": [{ "field": "Sprint Team", "fromString": "team 1", "toString": "team 2" }]
            }]
        }
    }));
    assert_eq!(issue.team_on(day("2016-01-05")), None);
}
