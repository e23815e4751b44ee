//! Error types for the reconciliation core.

use thiserror::Error;

/// Errors that can occur while normalizing records, building payloads,
/// or calling the calendar sink.
///
/// All of these are per-item: one failing task or event never aborts the
/// batch, the error is collected next to the offending record instead.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Work package {0} has no rendered description")]
    MissingRendered(i64),

    #[error("Invalid due date '{0}' (expected YYYY-MM-DD)")]
    DueDate(String),

    #[error("Invalid due-hour line '{0}' (expected dueHour=HH:MM:SS)")]
    DueHour(String),

    #[error("Invalid creation timestamp '{0}'")]
    CreatedAt(String),

    #[error("Event title '{0}' does not match '<id>:<subject>'")]
    Title(String),

    #[error("Event body does not end with assignee and update-time lines: '{0}'")]
    Body(String),

    #[error("Event '{0}' has no end time")]
    MissingEnd(String),

    #[error("Due time {0} does not exist in timezone {1}")]
    NonexistentTime(String, String),

    #[error("Calendar request failed: {0}")]
    Sink(String),
}

/// Result type alias for reconciliation operations.
pub type MirrorResult<T> = Result<T, MirrorError>;
