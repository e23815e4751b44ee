use anyhow::Result;
use chrono::Local;

use super::SyncContext;
use crate::{config, sheets};
use taskmirror_core::reconcile::reconcile;

/// Full run: fetch, normalize, reconcile, report.
pub async fn run() -> Result<()> {
    let ctx = SyncContext::load().await?;

    let report = reconcile(&ctx.tasks, &ctx.events, &ctx.gcal, &ctx.options).await;

    let created = report.partition.to_create.len() - report.create_errors.len();
    let deleted = report.partition.to_delete.len() - report.delete_errors.len();
    println!(
        "{} created, {} deleted, {} updated",
        created,
        deleted,
        report.updated.len()
    );

    if !report.is_clean() {
        println!("\n{} actions failed:", report.error_count());
        for (id, err) in &report.create_errors {
            println!("  create {}: {}", id, err);
        }
        for (id, err) in &report.delete_errors {
            println!("  delete {}: {}", id, err);
        }
        for (id, err) in &report.update_errors {
            println!("  update {}: {}", id, err);
        }
    }

    ctx.print_parse_failures();

    if ctx.config.logsheet.enabled {
        let tokens = config::load_tokens()?;
        let sheet = sheets::LogSheet::new(&ctx.config.logsheet.spreadsheet_id, &tokens.access_token);
        let logged_at = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();

        // The log sheet is observational; a failure here must not fail the sync
        if let Err(err) = sheet.append_run(&report, &logged_at).await {
            eprintln!("Warning: could not append to log sheet: {:#}", err);
        }
    }

    println!(
        "\nSynchronization completed at {}",
        Local::now().format("%Y-%m-%dT%H:%M:%S")
    );

    Ok(())
}
