//! Daily rollup of open-issue ages across a calendar range.
//!
//! Every issue is evaluated against every day of the range (queried at
//! midnight UTC). Issues open on a day contribute their age to the overall
//! bucket, to their project's bucket and to their `"<project> - <team>"`
//! bucket. Issues that are closed, or not yet created, contribute nothing.
//!
//! Identical issues are not deduplicated: passing the same issue twice
//! doubles its contribution.

use std::thread;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::AgelogError;
use crate::history::IssueHistory;
use crate::model::event::day_start;
use crate::summary::SummaryTable;

/// Rendering of an absent project or team inside a dimension key.
pub const ABSENT_LABEL: &str = "None";

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`AgelogError::InvalidDateRange`] when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AgelogError> {
        if start > end {
            return Err(AgelogError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering one day.
    #[must_use]
    pub const fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Every day from `start` to `end`, inclusive.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    /// Number of days in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// The project-only and project + team dimension keys for one data point.
#[must_use]
pub fn dimension_keys(project: Option<&str>, team: Option<&str>) -> (String, String) {
    let project = project.unwrap_or(ABSENT_LABEL);
    let team = team.unwrap_or(ABSENT_LABEL);
    (project.to_string(), format!("{project} - {team}"))
}

/// Builds a [`SummaryTable`] from issue histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    workers: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split the issue set across `workers` scoped threads. `0` and `1` both
    /// mean a single sequential pass.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Roll `issues` up over `range`.
    ///
    /// Every day of the range gets a row, even when no issue was open on it.
    #[must_use]
    pub fn aggregate(&self, issues: &[IssueHistory], range: &DateRange) -> SummaryTable {
        let chunk_size = issues.len().div_ceil(self.workers).max(1);
        let table = if self.workers == 1 || issues.len() <= chunk_size {
            aggregate_sequential(issues, range)
        } else {
            aggregate_chunked(issues, range, chunk_size)
        };

        info!(
            issues = issues.len(),
            days = range.len(),
            dimensions = table.dimension_count(),
            workers = self.workers,
            "aggregated issue ages"
        );
        table
    }
}

/// Sequential rollup over any sequence of histories.
#[must_use]
pub fn aggregate_sequential<'a, I>(issues: I, range: &DateRange) -> SummaryTable
where
    I: IntoIterator<Item = &'a IssueHistory>,
{
    let mut table = SummaryTable::new();
    for day in range.days() {
        table.ensure_day(day);
    }

    for (index, issue) in issues.into_iter().enumerate() {
        debug!(index, key = issue.key().unwrap_or("<unknown>"), "aggregating issue");
        accumulate(&mut table, issue, range);
    }

    table
}

fn aggregate_chunked(issues: &[IssueHistory], range: &DateRange, chunk_size: usize) -> SummaryTable {
    let partials: Vec<SummaryTable> = thread::scope(|scope| {
        let handles: Vec<_> = issues
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || aggregate_sequential(chunk, range)))
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(partial) => partial,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    });

    let mut table = SummaryTable::new();
    for partial in partials {
        table.merge(partial);
    }
    table
}

fn accumulate(table: &mut SummaryTable, issue: &IssueHistory, range: &DateRange) {
    for day in range.days() {
        let Some(state) = issue.state_on(day_start(day)) else {
            continue;
        };

        let (project_key, team_key) = dimension_keys(state.project, state.team);
        table.record(day, state.age_days, &[project_key.as_str(), team_key.as_str()]);
    }
}
