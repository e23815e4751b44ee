//! Optional Google Sheets run log.
//!
//! When `[logsheet]` is enabled, each sync appends one block to the
//! `errors` range and one to the `actions` range of the configured
//! spreadsheet. Purely observational: failures here warn on stderr and
//! never affect the reconciliation outcome.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use taskmirror_core::{MirrorError, SyncReport};

pub struct LogSheet {
    http: reqwest::Client,
    spreadsheet_id: String,
    access_token: String,
}

impl LogSheet {
    pub fn new(spreadsheet_id: &str, access_token: &str) -> Self {
        LogSheet {
            http: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Append the error and action summaries of one run.
    pub async fn append_run(&self, report: &SyncReport, logged_at: &str) -> Result<()> {
        self.append("errors", error_rows(report, logged_at)).await?;
        self.append("actions", action_rows(report, logged_at)).await?;
        Ok(())
    }

    async fn append(&self, range: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.spreadsheet_id, range
        );

        self.http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": rows }))
            .send()
            .await
            .with_context(|| format!("Failed to append to log sheet range '{}'", range))?
            .error_for_status()
            .with_context(|| format!("Log sheet append to '{}' was rejected", range))?;

        Ok(())
    }
}

fn error_cells(errors: &BTreeMap<i64, MirrorError>) -> Vec<String> {
    errors
        .iter()
        .map(|(id, err)| format!("{}: {}", id, err))
        .collect()
}

fn id_cells(ids: &BTreeSet<i64>) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn labelled(label: &str, mut cells: Vec<String>) -> Vec<String> {
    let mut row = vec![label.to_string()];
    row.append(&mut cells);
    row
}

/// Rows for the `errors` range: timestamp, then one label-prefixed row per
/// phase with `<id>: <error>` cells.
pub fn error_rows(report: &SyncReport, logged_at: &str) -> Vec<Vec<String>> {
    vec![
        vec![logged_at.to_string()],
        labelled("to_create_errors", error_cells(&report.create_errors)),
        labelled("to_delete_errors", error_cells(&report.delete_errors)),
        labelled("to_update_errors", error_cells(&report.update_errors)),
    ]
}

/// Rows for the `actions` range: timestamp, then one label-prefixed row per
/// phase with the classified ids.
pub fn action_rows(report: &SyncReport, logged_at: &str) -> Vec<Vec<String>> {
    vec![
        vec![logged_at.to_string()],
        labelled("to_create", id_cells(&report.partition.to_create)),
        labelled("to_delete", id_cells(&report.partition.to_delete)),
        labelled("to_update", id_cells(&report.partition.to_update)),
    ]
}
