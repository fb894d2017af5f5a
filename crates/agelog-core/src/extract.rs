//! Flat per-issue projection: named extractors pulling one renderable value
//! each out of a raw record.
//!
//! Extractors are pure and tolerant. A missing or mistyped nested path yields
//! `None`, which sinks render as an empty cell.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AgelogError;
use crate::model::event::parse_timestamp;
use crate::model::raw::RawIssue;

/// Timestamp rendering for date columns, in the timestamp's own offset.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Field-map keys of the custom fields the projection reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionFields {
    #[serde(default = "default_team_field")]
    pub team_field: String,
    #[serde(default = "default_reopen_field")]
    pub reopen_field: String,
}

impl Default for ProjectionFields {
    fn default() -> Self {
        Self {
            team_field: default_team_field(),
            reopen_field: default_reopen_field(),
        }
    }
}

fn default_team_field() -> String {
    "customfield_12700".to_string()
}

fn default_reopen_field() -> String {
    "customfield_13402".to_string()
}

/// One named column of the per-issue projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldExtractor {
    Key,
    IssueType,
    Status,
    Team,
    Created,
    ReopenDate,
    ResolutionDate,
    Components,
}

impl FieldExtractor {
    /// Every extractor in default column order.
    pub const ALL: [Self; 8] = [
        Self::Key,
        Self::IssueType,
        Self::Status,
        Self::Team,
        Self::Created,
        Self::ReopenDate,
        Self::ResolutionDate,
        Self::Components,
    ];

    /// Column name, also accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::IssueType => "issue_type",
            Self::Status => "status",
            Self::Team => "team",
            Self::Created => "created",
            Self::ReopenDate => "reopen_date",
            Self::ResolutionDate => "resolution_date",
            Self::Components => "components",
        }
    }

    /// Pull this column's value out of `issue`.
    #[must_use]
    pub fn extract(self, issue: &RawIssue, fields: &ProjectionFields) -> Option<String> {
        match self {
            Self::Key => issue.key().map(str::to_string),
            Self::IssueType => issue.field_str(&["issuetype", "name"]).map(str::to_string),
            Self::Status => issue.field_str(&["status", "name"]).map(str::to_string),
            Self::Team => issue
                .field_str(&[fields.team_field.as_str(), "value"])
                .map(str::to_string),
            Self::Created => issue.field_str(&["created"]).and_then(format_timestamp),
            Self::ReopenDate => issue
                .field(&fields.reopen_field)
                .and_then(|value| value.as_str().or_else(|| value.get("value")?.as_str()))
                .and_then(format_timestamp),
            Self::ResolutionDate => issue
                .field_str(&["resolutiondate"])
                .and_then(format_timestamp),
            Self::Components => issue.field("components").and_then(join_component_names),
        }
    }
}

impl fmt::Display for FieldExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldExtractor {
    type Err = AgelogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| AgelogError::UnknownField {
                raw: s.to_string(),
                expected: Self::ALL.map(Self::as_str).join(", "),
            })
    }
}

impl Serialize for FieldExtractor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldExtractor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Parse a comma separated list such as `key,status,created`.
///
/// # Errors
///
/// Returns [`AgelogError::UnknownField`] for the first unknown name.
pub fn parse_field_list(raw: &str) -> Result<Vec<FieldExtractor>, AgelogError> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(FieldExtractor::from_str)
        .collect()
}

/// One row of the projection: a value per requested field, in order.
#[must_use]
pub fn project_issue(
    issue: &RawIssue,
    columns: &[FieldExtractor],
    fields: &ProjectionFields,
) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|column| column.extract(issue, fields))
        .collect()
}

fn format_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|ts| ts.format(DATE_FORMAT).to_string())
}

fn join_component_names(value: &JsonValue) -> Option<String> {
    let components = value.as_array()?;
    let names: Vec<&str> = components
        .iter()
        .filter_map(|component| component.get("name").and_then(JsonValue::as_str))
        .collect();
    Some(names.join(","))
}
