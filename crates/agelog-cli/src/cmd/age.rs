use std::path::PathBuf;
use std::sync::Arc;

use agelog_core::config::resolve_workers;
use agelog_core::{Aggregator, DateRange, IssueHistory};
use anyhow::{Context as _, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use tracing::info;

use super::{Context, open_output, read_snapshot};
use crate::output;

#[derive(Args, Debug)]
pub struct AgeArgs {
    /// Issue snapshot (JSON array, search response or JSONL); omit to read stdin.
    #[arg(long, short, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// First day of the report (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub start: NaiveDate,

    /// Last day of the report, inclusive (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,

    /// Write the report here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Worker threads for the rollup (0 = all cores). Overrides `report.workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

pub fn run_age(args: &AgeArgs, ctx: &Context) -> Result<()> {
    let end = args.end.unwrap_or_else(|| Utc::now().date_naive());
    let range = DateRange::new(args.start, end).context("invalid report range")?;

    let (raw_issues, _report) = read_snapshot(args.input.as_deref())?;

    let fields = Arc::new(ctx.config.project.fields.history_fields());
    let histories: Vec<IssueHistory> = raw_issues
        .iter()
        .map(|raw| IssueHistory::from_raw(raw, &fields))
        .collect();

    let workers = resolve_workers(args.workers.unwrap_or(ctx.config.project.report.workers));
    let table = Aggregator::with_workers(workers).aggregate(&histories, &range);

    let mut out = open_output(args.output.as_deref())?;
    output::write_summary(&mut out, ctx.output, &table)?;

    if !ctx.quiet {
        info!(
            start = %range.start(),
            end = %range.end(),
            rows = table.len(),
            dimensions = table.dimension_count(),
            "age report written"
        );
    }
    Ok(())
}
