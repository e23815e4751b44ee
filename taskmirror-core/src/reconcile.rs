//! Reconciliation between the two normalized collections.
//!
//! Set algebra over the two id sets classifies every task id into exactly
//! one of create / delete / update, then the three phases drive the
//! corresponding sink calls. The unit of atomicity is one id's one action:
//! a failure is recorded against its id and never blocks or rolls back any
//! other id.

use crate::error::{MirrorError, MirrorResult};
use crate::event::{EventPayload, NormalizedEvent, build_event_payload};
use crate::options::SyncOptions;
use crate::workpackage::NormalizedTask;
use std::collections::{BTreeMap, BTreeSet};

/// Calendar mutation boundary. Implemented by the Google Calendar client
/// in the binary and by in-memory fakes in tests.
#[allow(async_fn_in_trait)]
pub trait EventSink {
    /// Create an event, returning the service-assigned event id.
    async fn create(&self, payload: &EventPayload) -> MirrorResult<String>;
    async fn delete(&self, event_id: &str) -> MirrorResult<()>;
    async fn update(&self, event_id: &str, payload: &EventPayload) -> MirrorResult<()>;
}

/// Three-way classification of the joined id sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Task ids with no mirrored event yet.
    pub to_create: BTreeSet<i64>,
    /// Event join keys with no matching task anymore.
    pub to_delete: BTreeSet<i64>,
    /// Ids present on both sides; updated only on timestamp drift.
    pub to_update: BTreeSet<i64>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty() && self.to_update.is_empty()
    }
}

/// Outcome of one reconciliation run: the classification plus per-id
/// failures for each phase, keyed by task id.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub partition: Partition,
    /// Update candidates whose event was actually rewritten.
    pub updated: BTreeSet<i64>,
    pub create_errors: BTreeMap<i64, MirrorError>,
    pub delete_errors: BTreeMap<i64, MirrorError>,
    pub update_errors: BTreeMap<i64, MirrorError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.create_errors.len() + self.delete_errors.len() + self.update_errors.len()
    }
}

/// Classify the two key sets.
pub fn partition(
    tasks: &BTreeMap<i64, NormalizedTask>,
    events: &BTreeMap<i64, NormalizedEvent>,
) -> Partition {
    let task_ids: BTreeSet<i64> = tasks.keys().copied().collect();
    let event_ids: BTreeSet<i64> = events.keys().copied().collect();

    Partition {
        to_create: task_ids.difference(&event_ids).copied().collect(),
        to_delete: event_ids.difference(&task_ids).copied().collect(),
        to_update: task_ids.intersection(&event_ids).copied().collect(),
    }
}

/// Run the three phases against the sink.
///
/// Update candidates are compared by exact string equality of the opaque
/// `updated_at` timestamps; equal timestamps mean no drift and no call.
/// Payload construction failures are recorded in the same per-id maps as
/// sink failures.
pub async fn reconcile<S: EventSink>(
    tasks: &BTreeMap<i64, NormalizedTask>,
    events: &BTreeMap<i64, NormalizedEvent>,
    sink: &S,
    options: &SyncOptions,
) -> SyncReport {
    let partition = partition(tasks, events);
    let mut report = SyncReport {
        partition: partition.clone(),
        ..SyncReport::default()
    };

    for id in &partition.to_create {
        let Some(task) = tasks.get(id) else { continue };
        let result = match build_event_payload(task, options) {
            Ok(payload) => sink.create(&payload).await.map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            report.create_errors.insert(*id, err);
        }
    }

    for id in &partition.to_delete {
        let Some(event) = events.get(id) else { continue };
        if let Err(err) = sink.delete(&event.event_id).await {
            report.delete_errors.insert(*id, err);
        }
    }

    for id in &partition.to_update {
        let (Some(task), Some(event)) = (tasks.get(id), events.get(id)) else {
            continue;
        };
        if task.updated_at == event.updated_at {
            continue;
        }
        let result = match build_event_payload(task, options) {
            Ok(payload) => sink.update(&event.event_id, &payload).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                report.updated.insert(*id);
            }
            Err(err) => {
                report.update_errors.insert(*id, err);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::normalize_events;
    use crate::workpackage::ParentRef;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use std::sync::Mutex;

    fn task(id: i64, updated_at: &str) -> NormalizedTask {
        NormalizedTask {
            id,
            subject: format!("Task {}", id),
            description: format!("<p>Body {}</p>", id),
            parent: Some(ParentRef {
                id: "1".to_string(),
                title: "Root".to_string(),
            }),
            assignee: Some("Alice".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_hour: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            updated_at: updated_at.to_string(),
        }
    }

    fn event(wp_id: i64, event_id: &str, updated_at: &str) -> NormalizedEvent {
        NormalizedEvent {
            event_id: event_id.to_string(),
            wp_id,
            subject: format!("Task {}", wp_id),
            assignee: Some("Alice".to_string()),
            updated_at: updated_at.to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_hour: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn tasks(items: Vec<NormalizedTask>) -> BTreeMap<i64, NormalizedTask> {
        items.into_iter().map(|t| (t.id, t)).collect()
    }

    fn events(items: Vec<NormalizedEvent>) -> BTreeMap<i64, NormalizedEvent> {
        items.into_iter().map(|e| (e.wp_id, e)).collect()
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Create(String),
        Delete(String),
        Update(String),
    }

    /// Records every call; fails any call whose summary/event id is listed.
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Call>>,
        fail_on: BTreeSet<String>,
    }

    impl RecordingSink {
        fn failing(keys: &[&str]) -> Self {
            RecordingSink {
                calls: Mutex::new(Vec::new()),
                fail_on: keys.iter().map(|k| k.to_string()).collect(),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().drain(..).collect()
        }

        fn check(&self, key: &str) -> MirrorResult<()> {
            if self.fail_on.contains(key) {
                Err(MirrorError::Sink(format!("injected failure for {}", key)))
            } else {
                Ok(())
            }
        }
    }

    impl EventSink for RecordingSink {
        async fn create(&self, payload: &EventPayload) -> MirrorResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(payload.summary.clone()));
            self.check(&payload.summary)?;
            Ok(format!("evt-{}", payload.summary))
        }

        async fn delete(&self, event_id: &str) -> MirrorResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Delete(event_id.to_string()));
            self.check(event_id)
        }

        async fn update(&self, event_id: &str, _payload: &EventPayload) -> MirrorResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(event_id.to_string()));
            self.check(event_id)
        }
    }

    /// A sink that actually mutates state, for the idempotence test.
    #[derive(Default)]
    struct InMemoryCalendar {
        store: Mutex<BTreeMap<String, (String, String, chrono::DateTime<Utc>)>>,
        next_id: Mutex<u64>,
        mutations: Mutex<usize>,
    }

    impl InMemoryCalendar {
        fn raw_events(&self) -> Vec<crate::event::RawEvent> {
            self.store
                .lock()
                .unwrap()
                .iter()
                .map(|(id, (summary, description, end))| crate::event::RawEvent {
                    id: id.clone(),
                    summary: summary.clone(),
                    description: description.clone(),
                    end: Some(*end),
                })
                .collect()
        }

        fn mutations(&self) -> usize {
            *self.mutations.lock().unwrap()
        }
    }

    impl EventSink for InMemoryCalendar {
        async fn create(&self, payload: &EventPayload) -> MirrorResult<String> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = format!("evt-{}", next_id);
            self.store.lock().unwrap().insert(
                id.clone(),
                (
                    payload.summary.clone(),
                    payload.description.clone(),
                    payload.end.with_timezone(&Utc),
                ),
            );
            *self.mutations.lock().unwrap() += 1;
            Ok(id)
        }

        async fn delete(&self, event_id: &str) -> MirrorResult<()> {
            self.store.lock().unwrap().remove(event_id);
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }

        async fn update(&self, event_id: &str, payload: &EventPayload) -> MirrorResult<()> {
            self.store.lock().unwrap().insert(
                event_id.to_string(),
                (
                    payload.summary.clone(),
                    payload.description.clone(),
                    payload.end.with_timezone(&Utc),
                ),
            );
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_partition_classification() {
        let tasks = tasks(vec![task(1, "t1"), task(2, "t2"), task(3, "t3")]);
        let events = events(vec![event(2, "e2", "t2"), event(3, "e3", "old"), event(9, "e9", "x")]);

        let p = partition(&tasks, &events);

        assert_eq!(p.to_create, BTreeSet::from([1]));
        assert_eq!(p.to_delete, BTreeSet::from([9]));
        assert_eq!(p.to_update, BTreeSet::from([2, 3]));
    }

    #[test]
    fn test_partition_completeness_and_disjointness() {
        let tasks = tasks(vec![task(1, "a"), task(2, "b")]);
        let events = events(vec![event(2, "e2", "b"), event(5, "e5", "c")]);

        let p = partition(&tasks, &events);

        let task_side: BTreeSet<i64> = p.to_create.union(&p.to_update).copied().collect();
        let event_side: BTreeSet<i64> = p.to_delete.union(&p.to_update).copied().collect();
        assert_eq!(task_side, tasks.keys().copied().collect());
        assert_eq!(event_side, events.keys().copied().collect());

        assert!(p.to_create.is_disjoint(&p.to_delete));
        assert!(p.to_create.is_disjoint(&p.to_update));
        assert!(p.to_delete.is_disjoint(&p.to_update));
    }

    #[test]
    fn test_partition_empty_overlap() {
        let tasks = tasks(vec![task(1, "a")]);
        let no_events = BTreeMap::new();

        let p = partition(&tasks, &no_events);
        assert_eq!(p.to_create, BTreeSet::from([1]));
        assert!(p.to_delete.is_empty());
        assert!(p.to_update.is_empty());
    }

    #[tokio::test]
    async fn test_no_drift_makes_no_update_call() {
        let tasks = tasks(vec![task(2, "same")]);
        let events = events(vec![event(2, "e2", "same")]);
        let sink = RecordingSink::default();

        let report = reconcile(&tasks, &events, &sink, &SyncOptions::default()).await;

        assert!(sink.calls().is_empty());
        assert!(report.updated.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_drift_makes_exactly_one_update_call() {
        let tasks = tasks(vec![task(2, "new")]);
        let events = events(vec![event(2, "e2", "old")]);
        let sink = RecordingSink::default();

        let report = reconcile(&tasks, &events, &sink, &SyncOptions::default()).await;

        assert_eq!(sink.calls(), vec![Call::Update("e2".to_string())]);
        assert_eq!(report.updated, BTreeSet::from([2]));
    }

    #[tokio::test]
    async fn test_all_three_phases_fire() {
        let tasks = tasks(vec![task(1, "a"), task(2, "drift")]);
        let events = events(vec![event(2, "e2", "old"), event(9, "e9", "x")]);
        let sink = RecordingSink::default();

        let report = reconcile(&tasks, &events, &sink, &SyncOptions::default()).await;

        assert_eq!(
            sink.calls(),
            vec![
                Call::Create("1:Task 1".to_string()),
                Call::Delete("e9".to_string()),
                Call::Update("e2".to_string()),
            ]
        );
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_create_failure_does_not_block_other_ids() {
        let tasks = tasks(vec![task(1, "a"), task(2, "b"), task(3, "c")]);
        let no_events = BTreeMap::new();
        let sink = RecordingSink::failing(&["2:Task 2"]);

        let report = reconcile(&tasks, &no_events, &sink, &SyncOptions::default()).await;

        // All three attempted, exactly one recorded failure keyed by id.
        assert_eq!(sink.calls().len(), 3);
        assert_eq!(report.create_errors.len(), 1);
        assert!(report.create_errors.contains_key(&2));
        assert!(report.delete_errors.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_keyed_per_phase() {
        let tasks = tasks(vec![task(1, "a"), task(2, "drift")]);
        let events = events(vec![event(2, "e2", "old"), event(9, "e9", "x")]);
        let sink = RecordingSink::failing(&["e9", "e2"]);

        let report = reconcile(&tasks, &events, &sink, &SyncOptions::default()).await;

        assert!(report.create_errors.is_empty());
        assert!(report.delete_errors.contains_key(&9));
        assert!(report.update_errors.contains_key(&2));
        assert!(report.updated.is_empty());
        assert_eq!(report.error_count(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_a_noop() {
        let options = SyncOptions::default();
        let all_tasks = tasks(vec![task(1, "a"), task(2, "b")]);
        let calendar = InMemoryCalendar::default();

        // First run mirrors everything into the empty calendar.
        let first = reconcile(&all_tasks, &BTreeMap::new(), &calendar, &options).await;
        assert!(first.is_clean());
        assert_eq!(calendar.mutations(), 2);

        // Second run re-derives the events from the mutated calendar.
        let (events, errors) = normalize_events(calendar.raw_events(), &options);
        assert!(errors.is_empty());

        let second = reconcile(&all_tasks, &events, &calendar, &options).await;
        assert!(second.partition.to_create.is_empty());
        assert!(second.partition.to_delete.is_empty());
        assert!(second.updated.is_empty());
        assert_eq!(calendar.mutations(), 2);
    }
}
