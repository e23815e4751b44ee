//! The event wire-format grammar.
//!
//! Mirrored events carry the join key and the comparison fields inside the
//! event title and body, so the association can be re-derived from the
//! calendar alone on the next run:
//!
//! - title: `<wp_id> ":" <subject>`
//! - body:  `<description> "Parent=" <parent> "\n" <assignee> "\n" <updated_at>`
//! - due-hour line (authored by the user at the end of a raw task
//!   description): `dueHour=HH:MM:SS`
//!
//! The description is concatenated verbatim into the body; it is rendered
//! markup and carries its own trailing tag, so no separator is inserted
//! before `Parent=`. Encode and decode here are exact inverses; other runs
//! depend on that for round-tripping.

use crate::constants::{NO_ASSIGNEE, NO_PARENT};
use crate::error::{MirrorError, MirrorResult};
use crate::workpackage::ParentRef;
use chrono::NaiveTime;

/// Trailing comparison fields recovered from an event body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyFields {
    pub assignee: Option<String>,
    pub updated_at: String,
}

/// Encode a task id and subject as an event title.
pub fn encode_title(id: i64, subject: &str) -> String {
    format!("{}:{}", id, subject)
}

/// Decode an event title into `(wp_id, subject)`.
///
/// The first `:`-segment must parse as an integer id; the last segment is
/// the subject. Titles without a `:` were not written by the mirror.
pub fn decode_title(title: &str) -> MirrorResult<(i64, String)> {
    if !title.contains(':') {
        return Err(MirrorError::Title(title.to_string()));
    }

    let first = title.split(':').next().unwrap_or_default();
    let id = first
        .trim()
        .parse::<i64>()
        .map_err(|_| MirrorError::Title(title.to_string()))?;

    let subject = title.rsplit(':').next().unwrap_or_default().to_string();

    Ok((id, subject))
}

/// Encode the event body from a task's fields.
///
/// Absent parent/assignee render as their sentinel strings; the decode
/// side folds the sentinels back to `None`.
pub fn encode_body(
    description: &str,
    parent: Option<&ParentRef>,
    assignee: Option<&str>,
    updated_at: &str,
) -> String {
    let parent = match parent {
        Some(p) => format!("{}:{}", p.id, p.title),
        None => NO_PARENT.to_string(),
    };
    let assignee = assignee.unwrap_or(NO_ASSIGNEE);

    format!(
        "{}Parent={}\n{}\n{}",
        description, parent, assignee, updated_at
    )
}

/// Decode the trailing comparison fields from an event body.
///
/// The second-to-last line is the assignee, the last line is the opaque
/// update timestamp. A body with fewer than three lines cannot have been
/// written by [`encode_body`].
pub fn decode_body(body: &str) -> MirrorResult<BodyFields> {
    let lines: Vec<&str> = body.split('\n').collect();
    if lines.len() < 3 {
        return Err(MirrorError::Body(body.to_string()));
    }

    let assignee = lines[lines.len() - 2];
    let assignee = if assignee == NO_ASSIGNEE {
        None
    } else {
        Some(assignee.to_string())
    };

    Ok(BodyFields {
        assignee,
        updated_at: lines[lines.len() - 1].to_string(),
    })
}

/// Extract the due hour from the last line of a raw task description.
///
/// Only the text after the last `=` is used; it must parse as `HH:MM:SS`
/// with seconds present.
pub fn decode_due_hour(raw_description: &str) -> MirrorResult<NaiveTime> {
    let line = raw_description.rsplit('\n').next().unwrap_or_default();
    let token = line.rsplit('=').next().unwrap_or_default().trim();

    NaiveTime::parse_from_str(token, "%H:%M:%S").map_err(|_| MirrorError::DueHour(line.to_string()))
}
