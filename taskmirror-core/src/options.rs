//! Tunable knobs for payload construction and event normalization.

use crate::constants::{DEFAULT_EVENT_DURATION_MINUTES, DEFAULT_REMINDER_MINUTES};
use chrono::Duration;
use chrono_tz::Tz;

/// Options that parameterize the mirror: where due times are anchored, how
/// long mirrored events are, and which reminders they carry.
///
/// The core never reads a clock or a config file; the binary builds this
/// from its `[sync]` config section and passes it in.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Timezone in which `due_date` + `due_hour` are anchored.
    pub timezone: Tz,
    /// Length of a mirrored event (end = start + duration).
    pub event_duration: Duration,
    /// Reminder offsets in minutes before the event start.
    pub reminder_minutes: Vec<i64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            timezone: Tz::UTC,
            event_duration: Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES),
            reminder_minutes: DEFAULT_REMINDER_MINUTES.to_vec(),
        }
    }
}
