//! Tolerant access to one raw tracker record.
//!
//! Records follow the Jira REST shape:
//!
//! ```text
//! { "key": "CNVS-1",
//!   "fields": { "created": "...", "project": { "name": "..." }, ... },
//!   "changelog": { "histories": [
//!       { "created": "...", "items": [ { "field", "fromString", "toString" } ] } ] } }
//! ```
//!
//! Older exports drop nested objects or carry them with the wrong type. Every
//! accessor here walks the JSON by hand and resolves anything missing or
//! mistyped to `None` instead of failing the whole record.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::event::{ChangeEvent, parse_timestamp};

/// One issue as fetched from the tracker, kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawIssue(JsonValue);

impl RawIssue {
    #[must_use]
    pub const fn new(value: JsonValue) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_json(&self) -> &JsonValue {
        &self.0
    }

    #[must_use]
    pub fn into_json(self) -> JsonValue {
        self.0
    }

    /// Issue key such as `CNVS-1234`.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.0.get("key").and_then(JsonValue::as_str)
    }

    /// Raw entry of the field map.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.0
            .get("fields")
            .and_then(|fields| fields.get(name))
            .filter(|value| !value.is_null())
    }

    /// Walk `fields.<path[0]>.<path[1]>...`.
    #[must_use]
    pub fn field_path(&self, path: &[&str]) -> Option<&JsonValue> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.field(first)?, |value, segment| value.get(segment))
            .filter(|value| !value.is_null())
    }

    /// String stored at `fields.<path...>`.
    #[must_use]
    pub fn field_str(&self, path: &[&str]) -> Option<&str> {
        self.field_path(path).and_then(JsonValue::as_str)
    }

    /// Creation timestamp with its original offset.
    #[must_use]
    pub fn created(&self) -> Option<DateTime<FixedOffset>> {
        self.field_str(&["created"]).and_then(parse_timestamp)
    }

    /// Flatten the changelog into individual field transitions.
    ///
    /// Entries without a parseable `created` timestamp and items without a
    /// `field` name are left out; see [`undated_fields`](Self::undated_fields)
    /// for what the undated entries touched. The result keeps changelog order;
    /// callers sort it.
    #[must_use]
    pub fn change_events(&self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        for history in self.histories() {
            let Some(timestamp) = history_timestamp(history) else {
                tracing::trace!(key = ?self.key(), "skipping history entry without timestamp");
                continue;
            };

            for item in history_items(history) {
                let Some(field) = item.get("field").and_then(JsonValue::as_str) else {
                    continue;
                };
                events.push(ChangeEvent::new(
                    timestamp,
                    field,
                    item.get("fromString").and_then(JsonValue::as_str),
                    item.get("toString").and_then(JsonValue::as_str),
                ));
            }
        }

        events
    }

    /// Names of the fields changed by history entries that carry no
    /// parseable `created` timestamp.
    ///
    /// Such a change happened at an unknown instant, so any reconstruction of
    /// those fields is unreliable.
    #[must_use]
    pub fn undated_fields(&self) -> BTreeSet<String> {
        self.histories()
            .filter(|history| history_timestamp(history).is_none())
            .flat_map(history_items)
            .filter_map(|item| item.get("field").and_then(JsonValue::as_str))
            .map(str::to_string)
            .collect()
    }

    fn histories(&self) -> impl Iterator<Item = &JsonValue> {
        self.0
            .get("changelog")
            .and_then(|changelog| changelog.get("histories"))
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
    }
}

fn history_timestamp(history: &JsonValue) -> Option<DateTime<Utc>> {
    history
        .get("created")
        .and_then(JsonValue::as_str)
        .and_then(parse_timestamp)
        .map(|ts| ts.with_timezone(&Utc))
}

fn history_items(history: &JsonValue) -> impl Iterator<Item = &JsonValue> {
    history
        .get("items")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
}

impl From<JsonValue> for RawIssue {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}
