//! Scheduled-event reconciler
//!
//! Diffs the event-ID set persisted for a list against a fresh plan,
//! cancels timers that are no longer wanted, arms the new ones and persists
//! the result. Also cleans up after lists that disappeared from storage.
//!
//! Ordering within one list: cancel, arm, then persist. A crash between
//! steps leaves the stored set as a superset of the armed timers, never a
//! subset, so nothing is orphaned.
//!
//! Passes are serialized: a full scan and a single-list pass never overlap,
//! so the stored-list enumeration a scan cancels against is never older
//! than the index it reads.

use crate::config::{EVENT_INDEX_KEY, EVENT_SET_KEY_PREFIX};
use crate::error::Result;
use crate::models::EventId;
use crate::platform::{Clock, PermissionProvider, TimerService};
use crate::services::planner::{plan, PlannedEvents};
use crate::storage::{KeyValueStore, ListStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key of the persisted event-ID set for a list
pub fn event_set_key(list_name: &str) -> String {
    format!("{}{}", EVENT_SET_KEY_PREFIX, list_name)
}

/// Timer calls issued by one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub armed: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub event_ids: BTreeSet<EventId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReconcileOutcome {
    Reconciled(ReconcileReport),
    /// Permission gate closed; nothing was touched
    PermissionDenied,
}

/// Result of a full scan over every stored list
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub reconciled: Vec<String>,
    pub permission_denied: Vec<String>,
    /// Lists skipped because their snapshot could not be loaded
    pub failed: Vec<(String, String)>,
    /// Lists whose reminders were cancelled because they were deleted
    pub removed: Vec<String>,
}

#[derive(Clone)]
pub struct Reconciler {
    lists: Arc<dyn ListStore>,
    store: Arc<dyn KeyValueStore>,
    timers: Arc<dyn TimerService>,
    permissions: Arc<dyn PermissionProvider>,
    clock: Arc<dyn Clock>,
    /// Held for the whole of every pass that reads or writes event sets
    pass_lock: Arc<Mutex<()>>,
}

impl Reconciler {
    pub fn new(
        lists: Arc<dyn ListStore>,
        store: Arc<dyn KeyValueStore>,
        timers: Arc<dyn TimerService>,
        permissions: Arc<dyn PermissionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lists,
            store,
            timers,
            permissions,
            clock,
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Event IDs currently persisted for a list. Unparseable entries are dropped.
    pub async fn stored_event_ids(&self, list_name: &str) -> Result<BTreeSet<EventId>> {
        let raw = self.store.get_string_set(&event_set_key(list_name)).await?;

        Ok(raw
            .iter()
            .filter_map(|value| match value.parse::<EventId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("Ignoring malformed event id '{}' for '{}'", value, list_name);
                    None
                }
            })
            .collect())
    }

    /// Names in the global index of lists with persisted reminders
    pub async fn indexed_lists(&self) -> Result<BTreeSet<String>> {
        self.store.get_string_set(EVENT_INDEX_KEY).await
    }

    /// Bring the platform timers for one list in line with `planned`.
    /// Caller holds the pass lock.
    ///
    /// New ids are armed. Ids already stored are re-armed only when the
    /// platform lost them and they are still in the future. Stored ids that
    /// are no longer planned are cancelled. Failed registrations are logged
    /// and left out of the persisted set so the next pass retries them.
    async fn reconcile(
        &self,
        list_name: &str,
        planned: &PlannedEvents,
        previous: &BTreeSet<EventId>,
    ) -> Result<ReconcileReport> {
        let now = self.clock.now();
        let mut report = ReconcileReport::default();

        for &id in previous.iter().filter(|id| !planned.contains_key(id)) {
            self.timers.cancel(id).await;
            report.cancelled += 1;
            tracing::debug!("Cancelled stale reminder {} for '{}'", id, list_name);
        }

        for (&id, event) in planned {
            let needs_arming = if previous.contains(&id) {
                event.trigger_at > now && !self.timers.is_pending(id).await
            } else {
                true
            };

            if !needs_arming {
                report.event_ids.insert(id);
                continue;
            }

            let armed = match event.payload() {
                Ok(payload) => self.timers.set_exact_wake(id, event.trigger_at, payload).await,
                Err(e) => Err(e),
            };

            match armed {
                Ok(()) => {
                    report.armed += 1;
                    report.event_ids.insert(id);
                    tracing::debug!(
                        "Scheduled reminder {} for '{}': {} days before expiration ({})",
                        id,
                        event.item.name,
                        event.key.notice_interval_days,
                        event.trigger_at
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Failed to schedule reminder {} for '{}' in '{}': {}",
                        id,
                        event.item.name,
                        list_name,
                        e
                    );
                }
            }
        }

        let persisted: BTreeSet<String> = report.event_ids.iter().map(|id| id.to_string()).collect();
        self.store
            .put_string_set(&event_set_key(list_name), &persisted)
            .await?;

        let name = list_name.to_string();
        self.store
            .update_string_set(
                EVENT_INDEX_KEY,
                Box::new(move |names| {
                    names.insert(name);
                }),
            )
            .await?;

        tracing::info!(
            "Finished scheduling for '{}': {} armed, {} cancelled, {} failed, {} persisted",
            list_name,
            report.armed,
            report.cancelled,
            report.failed,
            report.event_ids.len()
        );

        Ok(report)
    }

    /// Full reconciliation pass for one stored list.
    ///
    /// Skipped entirely when permissions are missing. Snapshot load errors
    /// propagate and leave the list's existing timers untouched.
    pub async fn schedule_for_list(&self, list_name: &str) -> Result<ReconcileOutcome> {
        let _pass = self.pass_lock.lock().await;
        self.schedule_list_locked(list_name).await
    }

    async fn schedule_list_locked(&self, list_name: &str) -> Result<ReconcileOutcome> {
        tracing::debug!("Scheduling reminders for '{}'", list_name);

        if !self.permissions.all_granted() {
            tracing::warn!(
                "Skipping reminder scheduling for '{}': permissions not granted",
                list_name
            );
            return Ok(ReconcileOutcome::PermissionDenied);
        }

        let list = self.lists.load(list_name).await?;
        let planned = plan(list_name, &list, self.clock.now());
        let previous = self.stored_event_ids(list_name).await?;

        let report = self.reconcile(list_name, &planned, &previous).await?;
        Ok(ReconcileOutcome::Reconciled(report))
    }

    /// Cancel every reminder of a list and drop it from the index
    async fn cancel_list(&self, list_name: &str) -> Result<usize> {
        let ids = self.stored_event_ids(list_name).await?;

        for &id in &ids {
            self.timers.cancel(id).await;
        }

        self.store.remove(&event_set_key(list_name)).await?;

        let name = list_name.to_string();
        self.store
            .update_string_set(
                EVENT_INDEX_KEY,
                Box::new(move |names| {
                    names.remove(&name);
                }),
            )
            .await?;

        tracing::info!("Cancelled {} reminder(s) for deleted list '{}'", ids.len(), list_name);
        Ok(ids.len())
    }

    /// Cancel reminders of indexed lists that are no longer stored.
    /// Returns the names that were cleaned up.
    async fn cancel_deleted_lists(&self, stored: &BTreeSet<String>) -> Result<Vec<String>> {
        let indexed = self.indexed_lists().await?;
        let deleted: Vec<String> = indexed.difference(stored).cloned().collect();

        if !deleted.is_empty() {
            tracing::info!("Cancelling reminders for deleted lists: {:?}", deleted);
        }

        for name in &deleted {
            self.cancel_list(name).await?;
        }

        Ok(deleted)
    }

    /// Clean up deleted lists, then reconcile every stored list.
    /// A list that fails to load is skipped; the scan carries on.
    pub async fn schedule_all(&self) -> Result<ScanReport> {
        let _pass = self.pass_lock.lock().await;
        tracing::info!("Starting reminder scan over all lists");

        let stored = self.lists.list_names().await?;
        let mut report = ScanReport {
            removed: self.cancel_deleted_lists(&stored).await?,
            ..ScanReport::default()
        };

        for name in &stored {
            match self.schedule_list_locked(name).await {
                Ok(ReconcileOutcome::Reconciled(_)) => report.reconciled.push(name.clone()),
                Ok(ReconcileOutcome::PermissionDenied) => {
                    report.permission_denied.push(name.clone())
                }
                Err(e) => {
                    tracing::error!("Skipping list '{}': {}", name, e);
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Reminder scan complete: {} reconciled, {} removed, {} failed, {} without permission",
            report.reconciled.len(),
            report.removed.len(),
            report.failed.len(),
            report.permission_denied.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{InventoryItem, InventoryList};
    use crate::platform::SettingsPermissions;
    use crate::storage::{FileListStore, MemoryKeyValueStore};
    use crate::testing::{FixedClock, RecordingTimers};
    use async_trait::async_trait;
    use chrono::{Days, NaiveDate, NaiveDateTime};
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    struct Fixture {
        reconciler: Reconciler,
        lists: Arc<FileListStore>,
        store: Arc<MemoryKeyValueStore>,
        timers: Arc<RecordingTimers>,
        _temp: TempDir,
    }

    fn morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn create_fixture(granted: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let lists = Arc::new(FileListStore::new(temp.path()));
        let store = Arc::new(MemoryKeyValueStore::new());
        let timers = Arc::new(RecordingTimers::new());
        let reconciler = Reconciler::new(
            lists.clone(),
            store.clone(),
            timers.clone(),
            Arc::new(SettingsPermissions::new(granted, granted)),
            Arc::new(FixedClock::new(morning())),
        );

        Fixture {
            reconciler,
            lists,
            store,
            timers,
            _temp: temp,
        }
    }

    fn item(id: u32, name: &str, days_out: u64, days_notice: u32) -> InventoryItem {
        InventoryItem {
            id,
            name: name.to_string(),
            code: String::new(),
            exp_date: morning().date() + Days::new(days_out),
            quantity: 1,
            days_notice,
        }
    }

    fn list(items: Vec<InventoryItem>) -> InventoryList {
        InventoryList {
            perishable: true,
            items,
        }
    }

    #[tokio::test]
    async fn test_first_pass_arms_and_persists() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();

        let outcome = fx.reconciler.schedule_for_list("Pantry").await.unwrap();
        let ReconcileOutcome::Reconciled(report) = outcome else {
            panic!("expected reconciliation");
        };

        assert_eq!(report.armed, 3);
        assert_eq!(report.cancelled, 0);
        assert_eq!(fx.timers.armed().len(), 3);
        assert_eq!(
            fx.reconciler.stored_event_ids("Pantry").await.unwrap(),
            report.event_ids
        );
        assert!(fx.reconciler.indexed_lists().await.unwrap().contains("Pantry"));
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14), item(2, "Eggs", 3, 7)]))
            .await
            .unwrap();

        fx.reconciler.schedule_for_list("Pantry").await.unwrap();
        let first_ids = fx.reconciler.stored_event_ids("Pantry").await.unwrap();
        fx.timers.clear_calls();

        fx.reconciler.schedule_for_list("Pantry").await.unwrap();

        assert!(fx.timers.calls().is_empty());
        assert_eq!(fx.reconciler.stored_event_ids("Pantry").await.unwrap(), first_ids);
    }

    #[tokio::test]
    async fn test_edit_changing_expiration_swaps_events() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 2, 3)]))
            .await
            .unwrap();
        fx.reconciler.schedule_for_list("Pantry").await.unwrap();
        let old_ids = fx.reconciler.stored_event_ids("Pantry").await.unwrap();
        fx.timers.clear_calls();

        let edited = list(vec![item(1, "Milk", 3, 7)]);
        fx.lists.save("Pantry", &edited).await.unwrap();
        fx.reconciler.schedule_for_list("Pantry").await.unwrap();

        let cancelled: BTreeSet<EventId> = fx.timers.cancelled().into_iter().collect();
        assert_eq!(cancelled, old_ids);

        // 3 days out with 7 days notice: intervals 1 and 3
        let expected: BTreeSet<EventId> = plan("Pantry", &edited, morning()).into_keys().collect();
        assert_eq!(expected.len(), 2);
        let created: BTreeSet<EventId> = fx.timers.created().into_iter().collect();
        assert_eq!(created, expected);
        assert!(created.is_disjoint(&old_ids));
        assert_eq!(fx.reconciler.stored_event_ids("Pantry").await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_permission_denied_touches_nothing() {
        let fx = create_fixture(false);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();
        fx.store
            .put_string_set(&event_set_key("Pantry"), &BTreeSet::from(["77".to_string()]))
            .await
            .unwrap();

        let outcome = fx.reconciler.schedule_for_list("Pantry").await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::PermissionDenied);
        assert!(fx.timers.calls().is_empty());
        assert_eq!(
            fx.reconciler.stored_event_ids("Pantry").await.unwrap(),
            BTreeSet::from([EventId(77)])
        );
    }

    #[tokio::test]
    async fn test_failed_registration_is_not_persisted() {
        let fx = create_fixture(true);
        let items = list(vec![item(1, "Milk", 10, 14)]);
        fx.lists.save("Pantry", &items).await.unwrap();

        let planned = plan("Pantry", &items, morning());
        let refused = *planned.keys().next().unwrap();
        fx.timers.refuse(refused);

        let ReconcileOutcome::Reconciled(report) =
            fx.reconciler.schedule_for_list("Pantry").await.unwrap()
        else {
            panic!("expected reconciliation");
        };

        assert_eq!(report.failed, 1);
        assert_eq!(report.armed, 2);
        assert!(!report.event_ids.contains(&refused));

        // Next pass retries the refused one only
        fx.timers.allow_all();
        fx.timers.clear_calls();
        fx.reconciler.schedule_for_list("Pantry").await.unwrap();
        assert_eq!(fx.timers.created(), vec![refused]);
    }

    #[tokio::test]
    async fn test_lost_timers_are_rebuilt() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();
        fx.reconciler.schedule_for_list("Pantry").await.unwrap();

        fx.timers.drop_all_pending();
        fx.timers.clear_calls();

        fx.reconciler.schedule_for_list("Pantry").await.unwrap();
        assert_eq!(fx.timers.created().len(), 3);
        assert!(fx.timers.cancelled().is_empty());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_error_and_keeps_timers() {
        let fx = create_fixture(true);
        fx.store
            .put_string_set(&event_set_key("Ghost"), &BTreeSet::from(["5".to_string()]))
            .await
            .unwrap();

        let result = fx.reconciler.schedule_for_list("Ghost").await;

        assert!(matches!(result, Err(AppError::ListNotFound(_))));
        assert!(fx.timers.calls().is_empty());
        assert_eq!(
            fx.reconciler.stored_event_ids("Ghost").await.unwrap(),
            BTreeSet::from([EventId(5)])
        );
    }

    #[tokio::test]
    async fn test_deleted_list_cleanup() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();
        fx.lists
            .save("Freezer", &list(vec![item(1, "Peas", 3, 7)]))
            .await
            .unwrap();
        fx.reconciler.schedule_all().await.unwrap();
        let pantry_ids = fx.reconciler.stored_event_ids("Pantry").await.unwrap();
        fx.timers.clear_calls();

        fx.lists.delete("Pantry").await.unwrap();
        let report = fx.reconciler.schedule_all().await.unwrap();

        assert_eq!(report.removed, vec!["Pantry".to_string()]);
        let cancelled: BTreeSet<EventId> = fx.timers.cancelled().into_iter().collect();
        assert_eq!(cancelled, pantry_ids);
        assert_eq!(fx.timers.cancelled().len(), pantry_ids.len());
        assert!(fx.reconciler.stored_event_ids("Pantry").await.unwrap().is_empty());
        assert!(!fx.reconciler.indexed_lists().await.unwrap().contains("Pantry"));
        assert!(fx.reconciler.indexed_lists().await.unwrap().contains("Freezer"));
    }

    #[tokio::test]
    async fn test_malformed_stored_ids_are_ignored() {
        let fx = create_fixture(true);
        fx.store
            .put_string_set(
                &event_set_key("Pantry"),
                &BTreeSet::from(["12".to_string(), "garbage".to_string()]),
            )
            .await
            .unwrap();

        let ids = fx.reconciler.stored_event_ids("Pantry").await.unwrap();
        assert_eq!(ids, BTreeSet::from([EventId(12)]));
    }

    /// Parks the first `list_names` call, after enumerating, until released
    struct GatedLists {
        inner: Arc<FileListStore>,
        gate: std::sync::Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    }

    #[async_trait]
    impl ListStore for GatedLists {
        async fn list_names(&self) -> Result<BTreeSet<String>> {
            let names = self.inner.list_names().await?;
            let gate = self.gate.lock().unwrap().take();
            if let Some((paused, resume)) = gate {
                paused.send(()).unwrap();
                resume.await.unwrap();
            }
            Ok(names)
        }

        async fn load(&self, name: &str) -> Result<InventoryList> {
            self.inner.load(name).await
        }

        async fn save(&self, name: &str, list: &InventoryList) -> Result<()> {
            self.inner.save(name, list).await
        }

        async fn delete(&self, name: &str) -> Result<bool> {
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn test_list_saved_during_scan_keeps_its_reminders() {
        let temp = TempDir::new().unwrap();
        let files = Arc::new(FileListStore::new(temp.path()));
        let (paused_tx, paused_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();
        let timers = Arc::new(RecordingTimers::new());
        let reconciler = Reconciler::new(
            Arc::new(GatedLists {
                inner: files.clone(),
                gate: std::sync::Mutex::new(Some((paused_tx, resume_rx))),
            }),
            Arc::new(MemoryKeyValueStore::new()),
            timers.clone(),
            Arc::new(SettingsPermissions::new(true, true)),
            Arc::new(FixedClock::new(morning())),
        );

        let scan = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.schedule_all().await }
        });
        paused_rx.await.unwrap();

        // Saved after the scan enumerated the stored lists
        files
            .save("Fresh", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();
        let save = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.schedule_for_list("Fresh").await }
        });
        tokio::task::yield_now().await;

        resume_tx.send(()).unwrap();
        let report = scan.await.unwrap().unwrap();
        save.await.unwrap().unwrap();

        assert!(report.removed.is_empty());
        assert!(timers.cancelled().is_empty());
        assert_eq!(timers.armed().len(), 3);
        assert_eq!(reconciler.stored_event_ids("Fresh").await.unwrap().len(), 3);
        assert!(reconciler.indexed_lists().await.unwrap().contains("Fresh"));
    }

    #[tokio::test]
    async fn test_concurrent_passes_on_one_list_arm_once() {
        let fx = create_fixture(true);
        fx.lists
            .save("Pantry", &list(vec![item(1, "Milk", 10, 14)]))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            fx.reconciler.schedule_for_list("Pantry"),
            fx.reconciler.schedule_for_list("Pantry")
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(fx.timers.created().len(), 3);
        assert_eq!(fx.reconciler.stored_event_ids("Pantry").await.unwrap().len(), 3);
    }
}
