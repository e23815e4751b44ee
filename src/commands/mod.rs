pub mod auth;
pub mod projects;
pub mod status;
pub mod sync;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::config::{self, Config};
use crate::gcal::GcalClient;
use crate::openproject::OpenProjectClient;
use taskmirror_core::event::normalize_events;
use taskmirror_core::reconcile;
use taskmirror_core::workpackage::normalize_work_packages;
use taskmirror_core::{
    MirrorError, NormalizedEvent, NormalizedTask, Partition, RawEvent, SyncOptions, WorkPackage,
};

/// Everything status and sync need: both sides fetched, normalized, and
/// classified, plus the connected calendar client for the mutation phase.
pub struct SyncContext {
    pub config: Config,
    pub options: SyncOptions,
    pub gcal: GcalClient,
    pub tasks: BTreeMap<i64, NormalizedTask>,
    pub task_errors: Vec<(WorkPackage, MirrorError)>,
    pub events: BTreeMap<i64, NormalizedEvent>,
    pub event_errors: Vec<(RawEvent, MirrorError)>,
    pub partition: Partition,
}

impl SyncContext {
    pub async fn load() -> Result<Self> {
        let config = config::load_config()?;
        let options = config.sync.options()?;

        let openproject =
            OpenProjectClient::new(&config.openproject.url, &config.openproject.api_key);
        let project_id = openproject.project_id(&config.openproject.project).await?;
        let work_packages = openproject.list_work_packages(project_id).await?;
        let (tasks, task_errors) = normalize_work_packages(work_packages);

        let gcal = GcalClient::connect(&config).await?;
        // The listing window is computed here so the core stays clock-free
        let not_before = Utc::now() - Duration::days(config.sync.lookback_days);
        let raw_events = gcal.list_events(not_before).await?;
        let (events, event_errors) = normalize_events(raw_events, &options);

        let partition = reconcile::partition(&tasks, &events);

        Ok(SyncContext {
            config,
            options,
            gcal,
            tasks,
            task_errors,
            events,
            event_errors,
            partition,
        })
    }

    /// Print per-item normalization failures, if any.
    pub fn print_parse_failures(&self) {
        if !self.task_errors.is_empty() {
            println!("\nWork packages that could not be normalized:");
            for (wp, err) in &self.task_errors {
                println!("  #{} \"{}\": {}", wp.id, wp.subject, err);
            }
        }

        if !self.event_errors.is_empty() {
            println!("\nCalendar events not recognized as mirrored tasks:");
            for (raw, err) in &self.event_errors {
                println!("  {} \"{}\": {}", raw.id, raw.summary, err);
            }
        }
    }
}
