//! Notification aggregator
//!
//! Merges each fired reminder into a per-list pending map and re-renders one
//! notification per list summarizing everything still pending. The map is
//! in-memory only: reminders that fired before a process restart are lost.

use crate::config::{EXPIRATION_CHANNEL_ID, LIST_FILE_EXTENSION, PENDING_RETENTION_MINUTES};
use crate::error::{AppError, Result};
use crate::models::{notification_id, reminder_trigger_at, InventoryItem, TimerPayload};
use crate::platform::{Clock, Notification, Notifier};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One fired reminder waiting to be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingReminder {
    pub trigger_at: NaiveDateTime,
    pub notice_interval_days: u32,
}

/// Shared pending-reminder map: list name -> item name -> reminder
#[derive(Clone, Default)]
pub struct PendingReminders {
    lists: Arc<Mutex<HashMap<String, HashMap<String, PendingReminder>>>>,
}

impl PendingReminders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a firing, prune entries older than `cutoff` and return what is
    /// left for the list, oldest trigger first. Empty lists are dropped.
    ///
    /// Keyed by item name only: a later firing for the same item replaces
    /// the earlier one whatever its interval.
    pub async fn record(
        &self,
        list_name: &str,
        item_name: &str,
        reminder: PendingReminder,
        cutoff: NaiveDateTime,
    ) -> Vec<(String, PendingReminder)> {
        let mut lists = self.lists.lock().await;

        let entries = lists.entry(list_name.to_string()).or_default();
        entries.insert(item_name.to_string(), reminder);
        entries.retain(|_, pending| pending.trigger_at >= cutoff);

        if entries.is_empty() {
            lists.remove(list_name);
            return Vec::new();
        }

        let mut current: Vec<(String, PendingReminder)> = entries
            .iter()
            .map(|(name, pending)| (name.clone(), *pending))
            .collect();
        current.sort_by(|a, b| a.1.trigger_at.cmp(&b.1.trigger_at).then_with(|| a.0.cmp(&b.0)));
        current
    }

    /// Pending reminders for a list, oldest trigger first
    pub async fn pending_for(&self, list_name: &str) -> Vec<(String, PendingReminder)> {
        let lists = self.lists.lock().await;

        let mut current: Vec<(String, PendingReminder)> = lists
            .get(list_name)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(name, pending)| (name.clone(), *pending))
                    .collect()
            })
            .unwrap_or_default();
        current.sort_by(|a, b| a.1.trigger_at.cmp(&b.1.trigger_at).then_with(|| a.0.cmp(&b.0)));
        current
    }

    /// Forget everything pending for a list (e.g. once the user opened it)
    pub async fn clear(&self, list_name: &str) {
        self.lists.lock().await.remove(list_name);
    }
}

/// Human-readable time left for a notice interval
pub fn format_time_left(days: u32) -> String {
    match days {
        0..=1 => "1 day".to_string(),
        2..=6 => format!("{} days", days),
        7..=13 => "1 week".to_string(),
        14..=29 => format!("{} weeks", days / 7),
        30..=59 => "1 month".to_string(),
        60..=364 => format!("{} months", days / 30),
        365..=729 => "1 year".to_string(),
        _ => format!("{} years", days / 365),
    }
}

/// List name as shown to the user, without a file extension
fn display_name(list_name: &str) -> &str {
    list_name
        .strip_suffix(&format!(".{}", LIST_FILE_EXTENSION))
        .unwrap_or(list_name)
}

/// Build the aggregated notification for a list
pub fn render(list_name: &str, reminders: &[(String, PendingReminder)]) -> Notification {
    let name = display_name(list_name);
    let count = reminders.len();

    let lines = reminders
        .iter()
        .map(|(item, pending)| {
            format!("{} left: {}", format_time_left(pending.notice_interval_days), item)
        })
        .collect();

    Notification {
        id: notification_id(list_name),
        channel: EXPIRATION_CHANNEL_ID.to_string(),
        list_name: list_name.to_string(),
        title: format!(
            "{} Item{} in {} expiring soon!",
            count,
            if count == 1 { "" } else { "s" },
            name
        ),
        body: format!("Items in {} going!", name),
        lines,
    }
}

/// Handles timer firings and keeps the per-list notification current
#[derive(Clone)]
pub struct NotificationAggregator {
    pending: PendingReminders,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    /// Serializes record-then-show so an older render never replaces a newer one
    render_lock: Arc<Mutex<()>>,
}

impl NotificationAggregator {
    pub fn new(pending: PendingReminders, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending,
            notifier,
            clock,
            render_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pending(&self) -> &PendingReminders {
        &self.pending
    }

    /// Decode a timer payload and aggregate it.
    ///
    /// An undecodable item drops this firing only; other pending reminders
    /// for the list are left alone.
    pub async fn on_timer_fired(&self, payload: &TimerPayload) -> Result<Option<Notification>> {
        let item: InventoryItem = serde_json::from_str(&payload.item_data).map_err(|e| {
            AppError::MalformedPayload(format!("list '{}': {}", payload.list_name, e))
        })?;

        tracing::debug!("Decoded item '{}' for list '{}'", item.name, payload.list_name);

        self.on_event_fired(&payload.list_name, &item, payload.notice_interval_days)
            .await
    }

    /// Merge one fired reminder and re-render the list's notification.
    /// Returns the notification shown, or `None` when nothing is current.
    pub async fn on_event_fired(
        &self,
        list_name: &str,
        item: &InventoryItem,
        notice_interval_days: u32,
    ) -> Result<Option<Notification>> {
        let trigger_at = reminder_trigger_at(item.exp_date, notice_interval_days).ok_or_else(|| {
            AppError::MalformedPayload(format!(
                "'{}' has no representable reminder {} days before {}",
                item.name, notice_interval_days, item.exp_date
            ))
        })?;

        let _render = self.render_lock.lock().await;

        let cutoff = self.clock.now() - Duration::minutes(PENDING_RETENTION_MINUTES);
        let current = self
            .pending
            .record(
                list_name,
                &item.name,
                PendingReminder {
                    trigger_at,
                    notice_interval_days,
                },
                cutoff,
            )
            .await;

        if current.is_empty() {
            tracing::debug!(
                "All reminders for '{}' are past their notification time, not showing",
                list_name
            );
            return Ok(None);
        }

        let notification = render(list_name, &current);
        self.notifier.show(&notification).await?;

        tracing::info!(
            "Notification {} shown for '{}' with {} item(s)",
            notification.id,
            list_name,
            current.len()
        );

        Ok(Some(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedClock, RecordingNotifier};
    use chrono::{Days, NaiveDate};

    fn afternoon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn create_test_aggregator() -> (NotificationAggregator, Arc<RecordingNotifier>, Arc<FixedClock>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(FixedClock::new(afternoon()));
        let aggregator =
            NotificationAggregator::new(PendingReminders::new(), notifier.clone(), clock.clone());
        (aggregator, notifier, clock)
    }

    /// Item whose `interval` reminder fires today at 15:00
    fn item_due_today(name: &str, interval: u32) -> InventoryItem {
        InventoryItem {
            id: 1,
            name: name.to_string(),
            code: String::new(),
            exp_date: afternoon().date() + Days::new(u64::from(interval)),
            quantity: 1,
            days_notice: interval,
        }
    }

    #[test]
    fn test_format_time_left_buckets() {
        assert_eq!(format_time_left(1), "1 day");
        assert_eq!(format_time_left(3), "3 days");
        assert_eq!(format_time_left(6), "6 days");
        assert_eq!(format_time_left(7), "1 week");
        assert_eq!(format_time_left(14), "2 weeks");
        assert_eq!(format_time_left(29), "4 weeks");
        assert_eq!(format_time_left(30), "1 month");
        assert_eq!(format_time_left(60), "2 months");
        assert_eq!(format_time_left(180), "6 months");
        assert_eq!(format_time_left(365), "1 year");
        assert_eq!(format_time_left(730), "2 years");
        assert_eq!(format_time_left(3650), "10 years");
    }

    #[tokio::test]
    async fn test_two_items_aggregate_into_one_notification() {
        let (aggregator, notifier, _clock) = create_test_aggregator();

        aggregator
            .on_event_fired("Pantry", &item_due_today("Milk", 7), 7)
            .await
            .unwrap();
        let shown = aggregator
            .on_event_fired("Pantry", &item_due_today("Rice", 30), 30)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(shown.title, "2 Items in Pantry expiring soon!");
        assert_eq!(shown.body, "Items in Pantry going!");
        assert_eq!(shown.lines.len(), 2);
        assert!(shown.lines.contains(&"1 week left: Milk".to_string()));
        assert!(shown.lines.contains(&"1 month left: Rice".to_string()));

        // Same notification id, updated in place
        let all = notifier.shown();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, all[1].id);
        assert_eq!(all[0].title, "1 Item in Pantry expiring soon!");
    }

    #[tokio::test]
    async fn test_lines_sorted_by_trigger_time() {
        let (aggregator, _notifier, _clock) = create_test_aggregator();

        // Fires tomorrow at 15:00, delivered first
        let later = InventoryItem {
            exp_date: afternoon().date() + Days::new(4),
            ..item_due_today("Later", 3)
        };
        aggregator.on_event_fired("Pantry", &later, 3).await.unwrap();

        let shown = aggregator
            .on_event_fired("Pantry", &item_due_today("Sooner", 1), 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(shown.lines, vec!["1 day left: Sooner", "3 days left: Later"]);
    }

    #[tokio::test]
    async fn test_stale_entries_are_pruned() {
        let (aggregator, _notifier, clock) = create_test_aggregator();

        aggregator
            .on_event_fired("Pantry", &item_due_today("Old", 7), 7)
            .await
            .unwrap();

        // Two hours later "Old" (today 15:00) is past the one hour retention
        clock.advance(Duration::hours(2));
        let fresh = InventoryItem {
            exp_date: afternoon().date() + Days::new(4),
            ..item_due_today("Fresh", 3)
        };

        let shown = aggregator
            .on_event_fired("Pantry", &fresh, 3)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(shown.title, "1 Item in Pantry expiring soon!");
        assert_eq!(shown.lines, vec!["3 days left: Fresh"]);
    }

    #[tokio::test]
    async fn test_all_stale_renders_nothing_and_clears_list() {
        let (aggregator, notifier, clock) = create_test_aggregator();

        clock.advance(Duration::hours(3));
        let result = aggregator
            .on_event_fired("Pantry", &item_due_today("Late", 7), 7)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(notifier.shown().is_empty());
        assert!(aggregator.pending().pending_for("Pantry").await.is_empty());
    }

    #[tokio::test]
    async fn test_same_item_last_write_wins() {
        let (aggregator, _notifier, _clock) = create_test_aggregator();

        let item = item_due_today("Flour", 7);
        aggregator.on_event_fired("Pantry", &item, 7).await.unwrap();
        let shown = aggregator
            .on_event_fired("Pantry", &item, 3)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(shown.lines, vec!["3 days left: Flour"]);
    }

    #[tokio::test]
    async fn test_lists_are_aggregated_separately() {
        let (aggregator, _notifier, _clock) = create_test_aggregator();

        let pantry = aggregator
            .on_event_fired("Pantry", &item_due_today("Milk", 7), 7)
            .await
            .unwrap()
            .unwrap();
        let freezer = aggregator
            .on_event_fired("Freezer.json", &item_due_today("Peas", 7), 7)
            .await
            .unwrap()
            .unwrap();

        assert_ne!(pantry.id, freezer.id);
        assert_eq!(freezer.title, "1 Item in Freezer expiring soon!");
    }

    #[tokio::test]
    async fn test_malformed_payload_leaves_pending_untouched() {
        let (aggregator, notifier, _clock) = create_test_aggregator();

        aggregator
            .on_event_fired("Pantry", &item_due_today("Milk", 7), 7)
            .await
            .unwrap();

        let payload = TimerPayload {
            list_name: "Pantry".to_string(),
            item_data: "{\"name\": 42".to_string(),
            notice_interval_days: 3,
        };
        let result = aggregator.on_timer_fired(&payload).await;

        assert!(matches!(result, Err(AppError::MalformedPayload(_))));
        assert_eq!(notifier.shown().len(), 1);
        assert_eq!(aggregator.pending().pending_for("Pantry").await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_firings_for_same_list() {
        let (aggregator, notifier, _clock) = create_test_aggregator();

        let mut handles = Vec::new();
        for i in 0..10 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                aggregator
                    .on_event_fired("Pantry", &item_due_today(&format!("Item {}", i), 7), 7)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(aggregator.pending().pending_for("Pantry").await.len(), 10);
        assert_eq!(notifier.shown().len(), 10);
    }
}
