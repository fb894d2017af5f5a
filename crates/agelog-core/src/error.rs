use std::fmt;

use chrono::NaiveDate;

/// Machine-readable error codes for scripts wrapping the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    SnapshotUnreadable,
    InvalidDateRange,
    UnknownField,
    FetchFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::SnapshotUnreadable => "E2001",
            Self::InvalidDateRange => "E2002",
            Self::UnknownField => "E2003",
            Self::FetchFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::SnapshotUnreadable => "Issue snapshot could not be read",
            Self::InvalidDateRange => "Invalid date range",
            Self::UnknownField => "Unknown issue field",
            Self::FetchFailed => "Issue fetch failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in agelog.toml and retry."),
            Self::SnapshotUnreadable => {
                Some("Pass a JSON array, a Jira search response, or one issue per line (JSONL).")
            }
            Self::InvalidDateRange => Some("The start date must not be after the end date."),
            Self::UnknownField => Some("Run `agelog issues --help` to list the known fields."),
            Self::FetchFailed => Some("Check the site URL, the JQL query and the API token."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed failures raised by the library outside the query paths.
#[derive(Debug, thiserror::Error)]
pub enum AgelogError {
    #[error("date range start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown field '{raw}': expected one of {expected}")]
    UnknownField { raw: String, expected: String },

    #[error("failed to parse config {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("snapshot is not a JSON array, a search response, or JSONL: {0}")]
    SnapshotUnreadable(String),

    #[error("request to {url} failed: {reason}")]
    FetchFailed { url: String, reason: String },
}

impl AgelogError {
    /// The stable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
            Self::UnknownField { .. } => ErrorCode::UnknownField,
            Self::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Self::SnapshotUnreadable(_) => ErrorCode::SnapshotUnreadable,
            Self::FetchFailed { .. } => ErrorCode::FetchFailed,
        }
    }

    /// Suggestion text for terminal output.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .unwrap_or_else(|| self.error_code().message())
            .to_string()
    }
}
