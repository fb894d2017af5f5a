//! The date x dimension summary table built by the aggregator.
//!
//! Rows are calendar days in ascending order. Each row carries the overall
//! `{count, total_age}` bucket plus one bucket per dimension key seen that
//! day. Dimension keys are opaque strings discovered at runtime (a project
//! name, or `"<project> - <team>"`), so the table is a two-level ordered map
//! rather than a fixed schema.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

/// First three columns of every rendered table.
pub const FIXED_COLUMNS: [&str; 3] = ["date", "count", "avg_age"];

/// Count and summed age of the (issue, date) pairs that landed in one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub count: u64,
    /// Sum of ages in fractional days.
    pub total_age: f64,
}

impl Bucket {
    pub fn add(&mut self, age_days: f64) {
        self.count += 1;
        self.total_age += age_days;
    }

    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.total_age += other.total_age;
    }

    /// Mean age, or `None` for an empty bucket.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_age / self.count as f64)
    }
}

/// Totals for one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayTotals {
    pub overall: Bucket,
    pub dimensions: BTreeMap<String, Bucket>,
}

impl DayTotals {
    /// Bucket for `key`, if any issue landed in it that day.
    #[must_use]
    pub fn dimension(&self, key: &str) -> Option<&Bucket> {
        self.dimensions.get(key)
    }
}

/// Rendered row: overall figures plus one average per discovered dimension,
/// aligned with [`SummaryTable::header`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub count: u64,
    pub avg_age: Option<f64>,
    pub dimension_averages: Vec<Option<f64>>,
}

impl SummaryRow {
    /// Cells as strings; absent averages render blank.
    #[must_use]
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(FIXED_COLUMNS.len() + self.dimension_averages.len());
        cells.push(self.date.format("%Y-%m-%d").to_string());
        cells.push(self.count.to_string());
        cells.push(format_age(self.avg_age));
        cells.extend(self.dimension_averages.iter().copied().map(format_age));
        cells
    }
}

/// Accumulated rollup keyed by (date, dimension).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    days: BTreeMap<NaiveDate, DayTotals>,
    dimensions: BTreeSet<String>,
}

impl SummaryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `date` has a row even if nothing lands on it.
    pub fn ensure_day(&mut self, date: NaiveDate) -> &mut DayTotals {
        self.days.entry(date).or_default()
    }

    /// Count one open issue of age `age_days` on `date` in the overall bucket
    /// and in each of `keys`.
    pub fn record(&mut self, date: NaiveDate, age_days: f64, keys: &[&str]) {
        let day = self.days.entry(date).or_default();
        day.overall.add(age_days);
        for key in keys {
            match day.dimensions.get_mut(*key) {
                Some(bucket) => bucket.add(age_days),
                None => {
                    let mut bucket = Bucket::default();
                    bucket.add(age_days);
                    day.dimensions.insert((*key).to_string(), bucket);
                }
            }
            if !self.dimensions.contains(*key) {
                self.dimensions.insert((*key).to_string());
            }
        }
    }

    /// Fold `other` into `self`. Sums per (date, dimension) and unions the
    /// discovered dimensions, so merge order does not change the totals.
    pub fn merge(&mut self, other: Self) {
        for (date, totals) in other.days {
            let day = self.days.entry(date).or_default();
            day.overall.merge(&totals.overall);
            for (key, bucket) in totals.dimensions {
                day.dimensions.entry(key).or_default().merge(&bucket);
            }
        }
        self.dimensions.extend(other.dimensions);
    }

    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&DayTotals> {
        self.days.get(&date)
    }

    /// Days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &DayTotals)> {
        self.days.iter().map(|(date, totals)| (*date, totals))
    }

    /// Discovered dimension keys in lexicographic order.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(String::as_str)
    }

    #[must_use]
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of date rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// `date, count, avg_age` followed by the sorted dimension keys.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        FIXED_COLUMNS
            .iter()
            .map(|column| (*column).to_string())
            .chain(self.dimensions.iter().cloned())
            .collect()
    }

    /// One rendered row per date, columns aligned with [`header`](Self::header).
    #[must_use]
    pub fn rows(&self) -> Vec<SummaryRow> {
        self.days
            .iter()
            .map(|(date, totals)| SummaryRow {
                date: *date,
                count: totals.overall.count,
                avg_age: totals.overall.average(),
                dimension_averages: self
                    .dimensions
                    .iter()
                    .map(|key| totals.dimension(key).and_then(Bucket::average))
                    .collect(),
            })
            .collect()
    }
}

/// Render an average age; absent renders as an empty cell.
#[must_use]
pub fn format_age(age: Option<f64>) -> String {
    age.map_or_else(String::new, |age| format!("{age:?}"))
}
