//! Event normalization and payload construction.
//!
//! `RawEvent` is the minimal slice of a calendar-service event the mirror
//! consumes; the binary's calendar client converts SDK events into it.
//! Normalization decodes the wire format back into the comparable schema,
//! and `build_event_payload` is its exact inverse: the payload built from a
//! task normalizes back to the same comparison fields.

use crate::codec;
use crate::error::{MirrorError, MirrorResult};
use crate::options::SyncOptions;
use crate::workpackage::NormalizedTask;
use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// A raw calendar event as fetched from the service.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Service-assigned id, needed for delete and update calls.
    pub id: String,
    pub summary: String,
    pub description: String,
    /// All-day events have no end instant and cannot have been written by
    /// the mirror.
    pub end: Option<DateTime<Utc>>,
}

/// A calendar event reduced to the comparable schema shared with tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub event_id: String,
    /// Join key back to the work package id, parsed from the title.
    pub wp_id: i64,
    pub subject: String,
    pub assignee: Option<String>,
    /// Opaque; compared for equality only.
    pub updated_at: String,
    pub due_date: NaiveDate,
    pub due_hour: NaiveTime,
}

/// The body handed to the calendar sink for create and update calls.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// Minutes before start; one popup reminder per entry.
    pub reminder_minutes: Vec<i64>,
}

/// Normalize one raw event by decoding the wire format.
///
/// The due date and hour are recovered from the end time by subtracting
/// the configured event duration, mirroring how the payload is built.
pub fn normalize_event(raw: &RawEvent, options: &SyncOptions) -> MirrorResult<NormalizedEvent> {
    let (wp_id, subject) = codec::decode_title(&raw.summary)?;
    let body = codec::decode_body(&raw.description)?;

    let end = raw.end.ok_or_else(|| MirrorError::MissingEnd(raw.id.clone()))?;
    let start = end.with_timezone(&options.timezone) - options.event_duration;

    Ok(NormalizedEvent {
        event_id: raw.id.clone(),
        wp_id,
        subject,
        assignee: body.assignee,
        updated_at: body.updated_at,
        due_date: start.date_naive(),
        due_hour: start.time(),
    })
}

/// Normalize a batch of raw events with per-item error isolation.
///
/// Events the mirror did not create (foreign titles, unexpected bodies)
/// land in the error list; they are never joined and never deleted.
pub fn normalize_events(
    events: Vec<RawEvent>,
    options: &SyncOptions,
) -> (BTreeMap<i64, NormalizedEvent>, Vec<(RawEvent, MirrorError)>) {
    let mut normalized = BTreeMap::new();
    let mut errors = Vec::new();

    for raw in events {
        match normalize_event(&raw, options) {
            Ok(event) => {
                normalized.insert(event.wp_id, event);
            }
            Err(err) => errors.push((raw, err)),
        }
    }

    (normalized, errors)
}

/// Build the calendar payload for a task.
///
/// Pure: the same task and options always yield the same payload. The
/// start is the due date + due hour anchored in the options timezone (an
/// ambiguous DST time resolves to the earliest instant, a nonexistent one
/// is an error); the end is start + the configured duration.
pub fn build_event_payload(
    task: &NormalizedTask,
    options: &SyncOptions,
) -> MirrorResult<EventPayload> {
    let naive = task.due_date.and_time(task.due_hour);

    let start = match options.timezone.from_local_datetime(&naive) {
        LocalResult::Single(start) => start,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(MirrorError::NonexistentTime(
                naive.to_string(),
                options.timezone.name().to_string(),
            ));
        }
    };
    let end = start + options.event_duration;

    Ok(EventPayload {
        summary: codec::encode_title(task.id, &task.subject),
        description: codec::encode_body(
            &task.description,
            task.parent.as_ref(),
            task.assignee.as_deref(),
            &task.updated_at,
        ),
        start,
        end,
        reminder_minutes: options.reminder_minutes.clone(),
    })
}
