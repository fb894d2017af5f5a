//! agelog-core library.
//!
//! Reconstructs what was true about a ticket on a past date from its
//! changelog, and rolls open-ticket ages up into a date x dimension table.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for I/O-facing helpers and
//!   [`error::AgelogError`] for typed failures. Point-in-time queries never
//!   fail; missing data resolves to `None`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod model;
pub mod source;
pub mod summary;

pub use aggregate::{Aggregator, DateRange};
pub use history::{HistoryFields, IssueHistory};
pub use model::event::ChangeEvent;
pub use model::raw::RawIssue;
pub use summary::{Bucket, SummaryRow, SummaryTable};
