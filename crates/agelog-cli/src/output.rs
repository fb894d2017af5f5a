//! Shared output layer for pretty/CSV/JSON parity across CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and a writer and renders
//! a table of cells: aligned columns for humans, RFC 4180 CSV for pipes and
//! spreadsheets, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` flag
//! 2. `FORMAT` env var
//! 3. user config `output`
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Csv`] if piped.
//!
//! The precedence itself lives in `agelog_core::config::resolve_output`.

use std::collections::BTreeMap;
use std::io::{self, Write};

use agelog_core::summary::{Bucket, SummaryTable};
use clap::ValueEnum;
use serde::Serialize;

/// Width cap for a single pretty column; longer cells are truncated.
pub const PRETTY_MAX_CELL: usize = 48;

/// The output formats supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Aligned table for terminals.
    Pretty,
    /// RFC 4180 CSV with a header row.
    Csv,
    /// Machine-readable JSON array.
    Json,
}

impl OutputMode {
    /// Parse a resolved mode name; unknown names fall back to CSV.
    pub fn from_resolved(raw: &str) -> Self {
        match raw {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Csv,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Returns `true` if JSON output was requested.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Quote a CSV field when it contains a comma, quote, CR or LF.
#[must_use]
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write one CSV record terminated by `\n`.
pub fn write_csv_record<S: AsRef<str>>(w: &mut dyn Write, cells: &[S]) -> io::Result<()> {
    let line = cells
        .iter()
        .map(|cell| csv_escape(cell.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(w, "{line}")
}

/// Write header and rows as an aligned table.
pub fn write_pretty_table(
    w: &mut dyn Write,
    header: &[String],
    rows: &[Vec<String>],
) -> io::Result<()> {
    let mut widths: Vec<usize> = header.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(display_width(cell));
            }
        }
    }

    write_pretty_line(w, header, &widths)?;
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    write_pretty_line(w, &rule, &widths)?;
    for row in rows {
        write_pretty_line(w, row, &widths)?;
    }
    Ok(())
}

fn display_width(cell: &str) -> usize {
    cell.chars().count().min(PRETTY_MAX_CELL)
}

fn truncate_cell(cell: &str) -> String {
    if cell.chars().count() <= PRETTY_MAX_CELL {
        return cell.to_string();
    }
    let mut truncated: String = cell.chars().take(PRETTY_MAX_CELL - 1).collect();
    truncated.push('…');
    truncated
}

fn write_pretty_line(w: &mut dyn Write, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", truncate_cell(cell), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(w, "{}", line.trim_end())
}

/// One date row of the JSON summary rendering.
#[derive(Debug, Serialize)]
pub struct JsonSummaryRow<'a> {
    pub date: String,
    pub count: u64,
    pub avg_age: Option<f64>,
    pub dimensions: BTreeMap<&'a str, JsonBucket>,
}

#[derive(Debug, Serialize)]
pub struct JsonBucket {
    pub count: u64,
    pub total_age: f64,
    pub avg_age: Option<f64>,
}

impl From<&Bucket> for JsonBucket {
    fn from(bucket: &Bucket) -> Self {
        Self {
            count: bucket.count,
            total_age: bucket.total_age,
            avg_age: bucket.average(),
        }
    }
}

fn json_summary_rows(table: &SummaryTable) -> Vec<JsonSummaryRow<'_>> {
    table
        .days()
        .map(|(date, totals)| JsonSummaryRow {
            date: date.format("%Y-%m-%d").to_string(),
            count: totals.overall.count,
            avg_age: totals.overall.average(),
            dimensions: totals
                .dimensions
                .iter()
                .map(|(key, bucket)| (key.as_str(), JsonBucket::from(bucket)))
                .collect(),
        })
        .collect()
}

/// Render the date x dimension summary.
pub fn write_summary(
    w: &mut dyn Write,
    mode: OutputMode,
    table: &SummaryTable,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, &json_summary_rows(table))?;
            writeln!(w)?;
        }
        OutputMode::Csv => {
            write_csv_record(w, &table.header())?;
            for row in table.rows() {
                write_csv_record(w, &row.to_cells())?;
            }
        }
        OutputMode::Pretty => {
            let rows: Vec<Vec<String>> = table.rows().iter().map(|row| row.to_cells()).collect();
            write_pretty_table(w, &table.header(), &rows)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Render per-issue projection rows under `header`. Absent values are blank
/// cells in CSV/pretty and `null` in JSON.
pub fn write_projection(
    w: &mut dyn Write,
    mode: OutputMode,
    header: &[&str],
    rows: &[Vec<Option<String>>],
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let objects: Vec<BTreeMap<&str, Option<&str>>> = rows
                .iter()
                .map(|row| {
                    header
                        .iter()
                        .copied()
                        .zip(row.iter().map(Option::as_deref))
                        .collect()
                })
                .collect();
            serde_json::to_writer_pretty(&mut *w, &objects)?;
            writeln!(w)?;
        }
        OutputMode::Csv => {
            write_csv_record(w, header)?;
            for row in rows {
                write_csv_record(w, &blank_cells(row))?;
            }
        }
        OutputMode::Pretty => {
            let header: Vec<String> = header.iter().map(|h| (*h).to_string()).collect();
            let rows: Vec<Vec<String>> = rows.iter().map(|row| blank_cells(row)).collect();
            write_pretty_table(w, &header, &rows)?;
        }
    }
    w.flush()?;
    Ok(())
}

fn blank_cells(row: &[Option<String>]) -> Vec<String> {
    row.iter().map(|cell| cell.clone().unwrap_or_default()).collect()
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2002").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Build from any `anyhow` error, lifting code and hint from a typed
    /// [`AgelogError`](agelog_core::error::AgelogError) anywhere in the chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let typed = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<agelog_core::error::AgelogError>());
        match typed {
            Some(typed) => Self {
                message: format!("{err:#}"),
                suggestion: Some(typed.suggestion()),
                error_code: Some(typed.error_code().code().to_string()),
            },
            None => Self::new(format!("{err:#}")),
        }
    }
}

/// Render an error in the requested format.
pub fn render_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *w, &wrapper)?;
            writeln!(w)?;
        }
        OutputMode::Pretty | OutputMode::Csv => {
            writeln!(w, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(w, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}
