use anyhow::Result;

use super::SyncContext;

/// Show what a sync would do, without touching the calendar.
pub async fn run() -> Result<()> {
    let ctx = SyncContext::load().await?;

    println!(
        "{} work packages, {} mirrored events",
        ctx.tasks.len(),
        ctx.events.len()
    );

    if ctx.partition.is_empty() {
        println!("Everything up to date.");
    } else {
        if !ctx.partition.to_create.is_empty() {
            println!("  To create:");
            for id in &ctx.partition.to_create {
                if let Some(task) = ctx.tasks.get(id) {
                    println!("    + {}: {}", id, task.subject);
                }
            }
        }

        if !ctx.partition.to_delete.is_empty() {
            println!("  To delete:");
            for id in &ctx.partition.to_delete {
                if let Some(event) = ctx.events.get(id) {
                    println!("    - {}: {}", id, event.subject);
                }
            }
        }

        let drifted: Vec<i64> = ctx
            .partition
            .to_update
            .iter()
            .copied()
            .filter(|id| match (ctx.tasks.get(id), ctx.events.get(id)) {
                (Some(task), Some(event)) => task.updated_at != event.updated_at,
                _ => false,
            })
            .collect();

        if !drifted.is_empty() {
            println!("  To update:");
            for id in &drifted {
                if let Some(task) = ctx.tasks.get(id) {
                    println!("    ~ {}: {}", id, task.subject);
                }
            }
        }

        let unchanged = ctx.partition.to_update.len() - drifted.len();
        if unchanged > 0 {
            println!("  {} mirrored events are already in sync", unchanged);
        }

        println!("\nRun `taskmirror sync` to apply these changes.");
    }

    ctx.print_parse_failures();

    Ok(())
}
