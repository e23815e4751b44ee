//! Defaults and wire-format markers shared across the mirror.

/// Default length of a mirrored event.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

/// Default reminder offsets (minutes before the event start).
pub const DEFAULT_REMINDER_MINUTES: [i64; 2] = [24 * 60, 30];

/// Default lower bound for listing calendar events, in days before now.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// Default timezone for anchoring due date + due hour.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// A raw description whose first line is exactly this marker is never mirrored.
pub const EXCLUSION_MARKER: &str = "!!!";

/// Rendered in the event body when the task has no parent relation.
pub const NO_PARENT: &str = "No parent";

/// Rendered in the event body when the task has no assignee.
pub const NO_ASSIGNEE: &str = "Not assigned to anyone";

/// Key of the due-hour line expected at the end of a raw task description
/// (`dueHour=HH:MM:SS`).
pub const DUE_HOUR_KEY: &str = "dueHour";
