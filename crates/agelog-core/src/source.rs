//! Loading issue snapshots fetched once from the tracker.
//!
//! Three layouts are accepted:
//!
//! - a JSON array of issue objects,
//! - a search response object carrying an `issues` array (what the Jira
//!   search endpoint returns), or a single issue object,
//! - JSONL, one issue object per line.
//!
//! Entries that are not JSON objects are skipped and counted; a document that
//! cannot be read at all is an error.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::AgelogError;
use crate::model::raw::RawIssue;

/// Outcome of loading a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub layout: &'static str,
    pub loaded: usize,
    pub skipped: usize,
}

/// Read every issue from `reader`.
///
/// # Errors
///
/// Fails when the input cannot be read or is not one of the accepted layouts.
pub fn load_snapshot<R: Read>(mut reader: R) -> Result<(Vec<RawIssue>, LoadReport)> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .context("failed to read issue snapshot")?;
    parse_snapshot(&content)
}

/// Read every issue from the file at `path`.
///
/// # Errors
///
/// Fails when the file cannot be opened or parsed.
pub fn load_snapshot_file(path: &Path) -> Result<(Vec<RawIssue>, LoadReport)> {
    let file =
        File::open(path).with_context(|| format!("failed to open snapshot {}", path.display()))?;
    load_snapshot(BufReader::new(file))
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

/// Parse snapshot text in any accepted layout.
///
/// # Errors
///
/// Returns [`AgelogError::SnapshotUnreadable`] for a malformed JSON array or
/// input where no line is valid JSON.
pub fn parse_snapshot(content: &str) -> Result<(Vec<RawIssue>, LoadReport)> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok((Vec::new(), LoadReport {
            layout: "empty",
            ..LoadReport::default()
        }));
    }

    if trimmed.starts_with('[') {
        let values: Vec<JsonValue> = serde_json::from_str(trimmed)
            .map_err(|err| AgelogError::SnapshotUnreadable(err.to_string()))?;
        return Ok(collect_objects(values, "array"));
    }

    if trimmed.starts_with('{') {
        if let Ok(document) = serde_json::from_str::<JsonValue>(trimmed) {
            return Ok(match document.get("issues").and_then(JsonValue::as_array) {
                Some(issues) => collect_objects(issues.clone(), "search"),
                None => collect_objects(vec![document], "object"),
            });
        }
    }

    parse_jsonl(content)
}

fn parse_jsonl(content: &str) -> Result<(Vec<RawIssue>, LoadReport)> {
    let mut issues = Vec::new();
    let mut report = LoadReport {
        layout: "jsonl",
        ..LoadReport::default()
    };

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonValue>(line) {
            Ok(value) if value.is_object() => {
                issues.push(RawIssue::new(value));
                report.loaded += 1;
            }
            Ok(_) => {
                warn!(line = line_no, "skipping snapshot line: not a JSON object");
                report.skipped += 1;
            }
            Err(err) => {
                warn!(line = line_no, %err, "skipping snapshot line: invalid JSON");
                report.skipped += 1;
            }
        }
    }

    if report.loaded == 0 && report.skipped > 0 {
        return Err(AgelogError::SnapshotUnreadable(format!(
            "none of {} lines held a JSON object",
            report.skipped
        ))
        .into());
    }

    debug!(loaded = report.loaded, skipped = report.skipped, "loaded JSONL snapshot");
    Ok((issues, report))
}

fn collect_objects(values: Vec<JsonValue>, layout: &'static str) -> (Vec<RawIssue>, LoadReport) {
    let mut report = LoadReport {
        layout,
        ..LoadReport::default()
    };
    let mut issues = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        if value.is_object() {
            issues.push(RawIssue::new(value));
            report.loaded += 1;
        } else {
            warn!(index, "skipping snapshot entry: not a JSON object");
            report.skipped += 1;
        }
    }

    debug!(layout, loaded = report.loaded, skipped = report.skipped, "loaded snapshot");
    (issues, report)
}

/// Write issues as JSONL, one compact object per line.
///
/// # Errors
///
/// Fails when serialization or the underlying writer fails.
pub fn write_snapshot<'a, W, I>(mut writer: W, issues: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a RawIssue>,
{
    let mut written = 0;
    for issue in issues {
        serde_json::to_writer(&mut writer, issue).context("failed to serialize issue")?;
        writeln!(writer).context("failed to write snapshot line")?;
        written += 1;
    }
    writer.flush().context("failed to flush snapshot")?;
    Ok(written)
}
