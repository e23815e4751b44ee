//! Work package normalization.
//!
//! Raw work packages arrive as OpenProject v3 JSON. Normalization reduces
//! them to the minimal schema shared with calendar events so the two sides
//! can be compared, and applies the eligibility rules: tasks without a raw
//! description, or whose description opens with the `!!!` marker, are never
//! mirrored.

use crate::codec;
use crate::constants::EXCLUSION_MARKER;
use crate::error::{MirrorError, MirrorResult};
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Collection envelope returned by the work package endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkPackageCollection {
    #[serde(rename = "_embedded")]
    pub embedded: WorkPackageElements,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkPackageElements {
    pub elements: Vec<WorkPackage>,
}

/// A raw work package, the slice of the API response the mirror consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackage {
    pub id: i64,
    pub subject: String,
    pub description: Description,
    #[serde(default)]
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

/// Task description in both the authored and the rendered form.
#[derive(Debug, Clone, Deserialize)]
pub struct Description {
    pub raw: Option<String>,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub parent: Option<Link>,
    #[serde(default)]
    pub assignee: Option<Link>,
}

/// A HAL relation link. `href` is null when the relation is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Parent relation of a task. Rendered as `"<id>:<title>"` in the event
/// body, absent parents render as the `"No parent"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub id: String,
    pub title: String,
}

/// A work package reduced to the comparable schema shared with events.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTask {
    pub id: i64,
    pub subject: String,
    /// Rendered description, used verbatim as the event body prefix.
    pub description: String,
    pub parent: Option<ParentRef>,
    pub assignee: Option<String>,
    pub due_date: NaiveDate,
    pub due_hour: NaiveTime,
    /// Opaque; compared for equality only, never parsed.
    pub updated_at: String,
}

/// Normalize one raw work package.
///
/// `Ok(None)` means the task is intentionally excluded from the mirror,
/// which is not an error. Due resolution: a task with an explicit due date
/// takes its hour from the `dueHour=` line at the end of the raw
/// description; a task without one falls back to its creation date and
/// time-of-day, so the event lands at "created now".
pub fn normalize_task(wp: &WorkPackage) -> MirrorResult<Option<NormalizedTask>> {
    let raw = match &wp.description.raw {
        Some(raw) => raw,
        None => return Ok(None),
    };
    if raw.split('\n').next() == Some(EXCLUSION_MARKER) {
        return Ok(None);
    }

    let description = wp
        .description
        .html
        .clone()
        .ok_or(MirrorError::MissingRendered(wp.id))?;

    let parent = wp.links.parent.as_ref().and_then(|link| {
        link.href.as_ref().map(|href| ParentRef {
            id: href.rsplit('/').next().unwrap_or_default().to_string(),
            title: link.title.clone().unwrap_or_default(),
        })
    });

    let assignee = wp
        .links
        .assignee
        .as_ref()
        .and_then(|link| link.href.as_ref().and(link.title.clone()));

    let (due_date, due_hour) = match &wp.due_date {
        Some(date) => {
            let due_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| MirrorError::DueDate(date.clone()))?;
            (due_date, codec::decode_due_hour(raw)?)
        }
        None => {
            // Face-value date and time-of-day of the creation timestamp;
            // the dueHour line has no effect on this branch.
            let created = DateTime::parse_from_rfc3339(&wp.created_at)
                .map_err(|_| MirrorError::CreatedAt(wp.created_at.clone()))?;
            (created.date_naive(), created.time())
        }
    };

    Ok(Some(NormalizedTask {
        id: wp.id,
        subject: wp.subject.trim().to_string(),
        description,
        parent,
        assignee,
        due_date,
        due_hour,
        updated_at: wp.updated_at.clone(),
    }))
}

/// Normalize a batch of work packages with per-item error isolation.
///
/// Failures carry the offending raw record; excluded tasks appear in
/// neither output.
pub fn normalize_work_packages(
    work_packages: Vec<WorkPackage>,
) -> (BTreeMap<i64, NormalizedTask>, Vec<(WorkPackage, MirrorError)>) {
    let mut tasks = BTreeMap::new();
    let mut errors = Vec::new();

    for wp in work_packages {
        match normalize_task(&wp) {
            Ok(Some(task)) => {
                tasks.insert(task.id, task);
            }
            Ok(None) => {}
            Err(err) => errors.push((wp, err)),
        }
    }

    (tasks, errors)
}
