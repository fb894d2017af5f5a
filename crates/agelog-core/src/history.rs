//! Point-in-time reconstruction of a single issue from its changelog.
//!
//! Trackers store only the *current* value of a field plus a log of changes.
//! The state of an issue at a past instant is recovered by scanning that log:
//!
//! - **Open/closed** is a sequence of `[opened, closed)` intervals. An interval
//!   starts at creation or at any status change leaving `Closed`, and ends at
//!   the first later change into `Closed`.
//! - **Project and team** at instant `t` are the `from` value of the first
//!   change recorded strictly after `t`, or the current value when nothing
//!   changed since.
//!
//! A change logged without a usable timestamp could have happened at any
//! instant, so queries over a field with such a change resolve to absent.
//!
//! Boundary comparisons are strict on both sides: a query at exactly the
//! instant of a transition sees the state *after* that transition.
//!
//! Each derived transition list is built on first use and cached for the
//! lifetime of the history, so querying one issue for every day of a long
//! range scans its changelog once per field.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::model::event::ChangeEvent;
use crate::model::raw::RawIssue;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Names of the tracker fields the reconstruction reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFields {
    /// Status value that marks an issue as closed.
    #[serde(default = "default_closed_status")]
    pub closed_status: String,
    /// Changelog name of the status field.
    #[serde(default = "default_status_field")]
    pub status_field: String,
    /// Changelog name of the project field.
    #[serde(default = "default_project_field")]
    pub project_field: String,
    /// Changelog name of the team field (display name, e.g. `Sprint Team`).
    #[serde(default = "default_team_history_field")]
    pub team_history_field: String,
    /// Field-map key of the team field (e.g. `customfield_12700`), holding
    /// `{ "value": "<team>" }`.
    #[serde(default = "default_team_field")]
    pub team_field: String,
}

impl Default for HistoryFields {
    fn default() -> Self {
        Self {
            closed_status: default_closed_status(),
            status_field: default_status_field(),
            project_field: default_project_field(),
            team_history_field: default_team_history_field(),
            team_field: default_team_field(),
        }
    }
}

fn default_closed_status() -> String {
    "Closed".to_string()
}

fn default_status_field() -> String {
    "status".to_string()
}

fn default_project_field() -> String {
    "project".to_string()
}

fn default_team_history_field() -> String {
    "Sprint Team".to_string()
}

fn default_team_field() -> String {
    "customfield_12700".to_string()
}

/// A change of a tracked value: at `at` the field stopped holding `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Transition {
    at: DateTime<Utc>,
    from: Option<String>,
}

/// What was true about an issue at one instant while it was open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenState<'a> {
    /// Fractional days since the issue was last opened.
    pub age_days: f64,
    pub project: Option<&'a str>,
    pub team: Option<&'a str>,
}

/// One issue with point-in-time queries over its changelog.
#[derive(Debug, Clone)]
pub struct IssueHistory {
    key: Option<String>,
    created_at: Option<DateTime<Utc>>,
    events: Vec<ChangeEvent>,
    current_project: Option<String>,
    current_team: Option<String>,
    fields: Arc<HistoryFields>,
    undated_fields: BTreeSet<String>,

    open_dates: OnceLock<Vec<DateTime<Utc>>>,
    close_dates: OnceLock<Vec<DateTime<Utc>>>,
    project_transitions: OnceLock<Vec<Transition>>,
    team_transitions: OnceLock<Vec<Transition>>,
}

impl IssueHistory {
    /// Build a history from a raw record using the default field names.
    #[must_use]
    pub fn new(raw: &RawIssue) -> Self {
        Self::from_raw(raw, &Arc::new(HistoryFields::default()))
    }

    /// Build a history from a raw record.
    #[must_use]
    pub fn from_raw(raw: &RawIssue, fields: &Arc<HistoryFields>) -> Self {
        Self::from_parts(
            raw.key().map(str::to_string),
            raw.created().map(|ts| ts.with_timezone(&Utc)),
            raw.change_events(),
            raw.field_str(&[fields.project_field.as_str(), "name"])
                .map(str::to_string),
            raw.field_str(&[fields.team_field.as_str(), "value"])
                .map(str::to_string),
            Arc::clone(fields),
        )
        .with_undated_fields(raw.undated_fields())
    }

    /// Build a history from already extracted parts.
    ///
    /// `events` may be in any order; they are stably sorted by timestamp here.
    #[must_use]
    pub fn from_parts(
        key: Option<String>,
        created_at: Option<DateTime<Utc>>,
        mut events: Vec<ChangeEvent>,
        current_project: Option<String>,
        current_team: Option<String>,
        fields: Arc<HistoryFields>,
    ) -> Self {
        events.sort_by_key(|event| event.timestamp);
        Self {
            key,
            created_at,
            events,
            current_project,
            current_team,
            fields,
            undated_fields: BTreeSet::new(),
            open_dates: OnceLock::new(),
            close_dates: OnceLock::new(),
            project_transitions: OnceLock::new(),
            team_transitions: OnceLock::new(),
        }
    }

    /// Mark fields that were changed at an unknown instant.
    #[must_use]
    pub fn with_undated_fields(mut self, fields: BTreeSet<String>) -> Self {
        if !fields.is_empty() {
            debug!(key = ?self.key, fields = ?fields, "changelog has undated changes");
        }
        self.undated_fields = fields;
        self
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Changelog sorted by timestamp.
    #[must_use]
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    #[must_use]
    pub fn current_project(&self) -> Option<&str> {
        self.current_project.as_deref()
    }

    #[must_use]
    pub fn current_team(&self) -> Option<&str> {
        self.current_team.as_deref()
    }

    /// Latest opening (creation or reopen) strictly before `date`.
    #[must_use]
    pub fn last_opened(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let opens = self.open_dates();
        let idx = opens.partition_point(|opened| *opened < date);
        idx.checked_sub(1).map(|i| opens[i])
    }

    /// Earliest close strictly after `after`.
    #[must_use]
    pub fn next_closed(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let closes = self.close_dates();
        let idx = closes.partition_point(|closed| *closed <= after);
        closes.get(idx).copied()
    }

    /// Age in fractional days if the issue was open at `date`, else `None`.
    #[must_use]
    pub fn age_on(&self, date: DateTime<Utc>) -> Option<f64> {
        self.created_at?;
        if self.is_undated(&self.fields.status_field) {
            return None;
        }
        let opened = self.last_opened(date)?;

        match self.next_closed(opened) {
            Some(closed) if closed <= date => None,
            _ => Some(days_between(opened, date)),
        }
    }

    /// Alias of [`age_on`](Self::age_on): open iff an age is returned.
    #[must_use]
    pub fn is_open_on(&self, date: DateTime<Utc>) -> Option<f64> {
        self.age_on(date)
    }

    /// Project the issue belonged to at `date`.
    #[must_use]
    pub fn project_on(&self, date: DateTime<Utc>) -> Option<&str> {
        if self.is_undated(&self.fields.project_field) {
            return None;
        }
        self.value_on(
            self.project_transitions(),
            date,
            self.current_project.as_deref(),
        )
    }

    /// Team that owned the issue at `date`.
    #[must_use]
    pub fn team_on(&self, date: DateTime<Utc>) -> Option<&str> {
        if self.is_undated(&self.fields.team_history_field) {
            return None;
        }
        self.value_on(self.team_transitions(), date, self.current_team.as_deref())
    }

    /// Age, project and team at `date`, or `None` when the issue was not open.
    #[must_use]
    pub fn state_on(&self, date: DateTime<Utc>) -> Option<OpenState<'_>> {
        let age_days = self.age_on(date)?;
        Some(OpenState {
            age_days,
            project: self.project_on(date),
            team: self.team_on(date),
        })
    }

    fn is_undated(&self, field: &str) -> bool {
        self.undated_fields.contains(field)
    }

    fn value_on<'a>(
        &'a self,
        transitions: &'a [Transition],
        date: DateTime<Utc>,
        current: Option<&'a str>,
    ) -> Option<&'a str> {
        let created = self.created_at?;
        if date < created {
            return None;
        }

        let idx = transitions.partition_point(|t| t.at <= date);
        let value = match transitions.get(idx) {
            Some(next) => next.from.as_deref(),
            None => current,
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn open_dates(&self) -> &[DateTime<Utc>] {
        self.open_dates.get_or_init(|| {
            let closed = self.fields.closed_status.as_str();
            let mut opens: Vec<_> = self
                .created_at
                .into_iter()
                .chain(
                    self.field_events(&self.fields.status_field)
                        .filter(|event| event.reopens(closed))
                        .map(|event| event.timestamp),
                )
                .collect();
            opens.sort_unstable();
            trace!(key = ?self.key, opens = opens.len(), "derived open transitions");
            opens
        })
    }

    fn close_dates(&self) -> &[DateTime<Utc>] {
        self.close_dates.get_or_init(|| {
            let closed = self.fields.closed_status.as_str();
            let closes: Vec<_> = self
                .field_events(&self.fields.status_field)
                .filter(|event| event.closes(closed))
                .map(|event| event.timestamp)
                .collect();
            trace!(key = ?self.key, closes = closes.len(), "derived close transitions");
            closes
        })
    }

    fn project_transitions(&self) -> &[Transition] {
        self.project_transitions
            .get_or_init(|| self.transitions_for(&self.fields.project_field))
    }

    fn team_transitions(&self) -> &[Transition] {
        self.team_transitions
            .get_or_init(|| self.transitions_for(&self.fields.team_history_field))
    }

    /// Transitions of one field, one per timestamp. When several changes
    /// share an instant the one logged last wins.
    fn transitions_for(&self, field: &str) -> Vec<Transition> {
        let mut out: Vec<Transition> = Vec::new();
        for event in self.field_events(field) {
            let transition = Transition {
                at: event.timestamp,
                from: event.from_value.clone(),
            };
            match out.last_mut() {
                Some(last) if last.at == transition.at => *last = transition,
                _ => out.push(transition),
            }
        }
        trace!(key = ?self.key, field, transitions = out.len(), "derived field transitions");
        out
    }

    fn field_events<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ChangeEvent> + 'a {
        self.events.iter().filter(move |event| event.is_field(field))
    }
}

impl From<&RawIssue> for IssueHistory {
    fn from(raw: &RawIssue) -> Self {
        Self::new(raw)
    }
}

#[allow(clippy::cast_precision_loss)]
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    fn status(ts: DateTime<Utc>, from: &str, to: &str) -> ChangeEvent {
        ChangeEvent::new(ts, "status", Some(from), Some(to))
    }

    fn history(created: DateTime<Utc>, events: Vec<ChangeEvent>) -> IssueHistory {
        IssueHistory::from_parts(
            Some("T-1".into()),
            Some(created),
            events,
            Some("Canvas".into()),
            None,
            Arc::new(HistoryFields::default()),
        )
    }

    #[test]
    fn never_closed_is_open_with_age_since_creation() {
        let issue = history(at(2015, 1, 1), vec![]);
        assert_eq!(issue.age_on(at(2015, 1, 1)), None);
        assert_eq!(issue.age_on(at(2015, 1, 3)), Some(2.0));
    }

    #[test]
    fn query_at_creation_instant_is_not_open() {
        let issue = history(at(2015, 1, 1), vec![]);
        assert!(issue.last_opened(at(2015, 1, 1)).is_none());
        assert_eq!(
            issue.last_opened(at(2015, 1, 1) + Duration::milliseconds(1)),
            Some(at(2015, 1, 1))
        );
    }

    #[test]
    fn close_at_query_instant_counts_as_closed() {
        let issue = history(at(2016, 3, 3), vec![status(at(2016, 3, 5), "Open", "Closed")]);
        assert!(issue.age_on(at(2016, 3, 5)).is_none());
        assert_eq!(issue.age_on(at(2016, 3, 4)), Some(1.0));
    }

    #[test]
    fn fractional_days_are_preserved() {
        let issue = history(at(2016, 3, 3), vec![]);
        let age = issue
            .age_on(at(2016, 3, 4) + Duration::hours(12))
            .expect("open");
        assert!((age - 1.5).abs() < 1e-9);
    }

    #[test]
    fn next_closed_uses_strict_greater_than() {
        let issue = history(
            at(2016, 1, 1),
            vec![
                status(at(2016, 3, 3), "Open", "Closed"),
                status(at(2016, 3, 1), "Open", "Closed"),
            ],
        );
        assert_eq!(issue.next_closed(at(2016, 3, 1)), Some(at(2016, 3, 3)));
        assert_eq!(issue.next_closed(at(2016, 2, 1)), Some(at(2016, 3, 1)));
        assert_eq!(issue.next_closed(at(2016, 3, 3)), None);
    }

    #[test]
    fn empty_or_blank_team_is_absent() {
        let issue = IssueHistory::from_parts(
            None,
            Some(at(2016, 1, 1)),
            vec![ChangeEvent::new(at(2016, 2, 1), "Sprint Team", Some(""), Some("team 1"))],
            Some("Canvas".into()),
            Some("team 1".into()),
            Arc::new(HistoryFields::default()),
        );
        assert_eq!(issue.team_on(at(2016, 1, 15)), None);
        assert_eq!(issue.team_on(at(2016, 2, 15)), Some("team 1"));
    }

    #[test]
    fn same_instant_changes_keep_last_logged() {
        let issue = IssueHistory::from_parts(
            None,
            Some(at(2016, 1, 1)),
            vec![
                ChangeEvent::new(at(2016, 2, 1), "project", Some("First"), Some("Mid")),
                ChangeEvent::new(at(2016, 2, 1), "project", Some("Second"), Some("Canvas")),
            ],
            Some("Canvas".into()),
            None,
            Arc::new(HistoryFields::default()),
        );
        assert_eq!(issue.project_on(at(2016, 1, 15)), Some("Second"));
    }

    #[test]
    fn missing_creation_makes_every_query_absent() {
        let issue = IssueHistory::from_parts(
            None,
            None,
            vec![status(at(2016, 3, 10), "Closed", "Open")],
            Some("Canvas".into()),
            Some("team".into()),
            Arc::new(HistoryFields::default()),
        );
        assert!(issue.age_on(at(2016, 3, 12)).is_none());
        assert!(issue.project_on(at(2016, 3, 12)).is_none());
        assert!(issue.team_on(at(2016, 3, 12)).is_none());
        assert!(issue.state_on(at(2016, 3, 12)).is_none());
    }

    #[test]
    fn custom_closed_status_is_honoured() {
        let fields = HistoryFields {
            closed_status: "Done".into(),
            ..HistoryFields::default()
        };
        let issue = IssueHistory::from_parts(
            None,
            Some(at(2016, 1, 1)),
            vec![
                status(at(2016, 1, 5), "Open", "Done"),
                status(at(2016, 1, 6), "Open", "Closed"),
            ],
            None,
            None,
            Arc::new(fields),
        );
        assert!(issue.age_on(at(2016, 1, 7)).is_none());
        assert_eq!(issue.close_dates().len(), 1);
    }

    #[test]
    fn caches_are_built_once_and_reused() {
        let issue = history(at(2016, 1, 1), vec![status(at(2016, 1, 5), "Open", "Closed")]);
        let first = issue.close_dates().as_ptr();
        let _ = issue.age_on(at(2016, 1, 3));
        let _ = issue.age_on(at(2016, 1, 9));
        assert_eq!(first, issue.close_dates().as_ptr());
        assert_eq!(issue.age_on(at(2016, 1, 3)), issue.age_on(at(2016, 1, 3)));
    }

    #[test]
    fn state_on_bundles_all_three_facts() {
        let issue = history(at(2016, 1, 1), vec![]);
        let state = issue.state_on(at(2016, 1, 2)).expect("open");
        assert_eq!(state.age_days, 1.0);
        assert_eq!(state.project, Some("Canvas"));
        assert_eq!(state.team, None);
    }

    #[test]
    fn history_fields_parse_with_partial_overrides() {
        let fields: HistoryFields =
            toml::from_str("closed_status = \"Resolved\"").expect("parse fields");
        assert_eq!(fields.closed_status, "Resolved");
        assert_eq!(fields.team_field, "customfield_12700");
        assert_eq!(fields.team_history_field, "Sprint Team");
    }
}
