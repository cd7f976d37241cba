//! Reminder-related commands
//!
//! Scheduling passes, timer firings and the pending-reminder view.

use crate::app::AppState;
use crate::error::Result;
use crate::models::TimerPayload;
use crate::platform::Notification;
use crate::services::aggregator::format_time_left;
use crate::services::{ReconcileOutcome, ScanReport};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Reconcile every stored list and clean up after deleted ones
pub async fn schedule_all(state: &AppState) -> Result<ScanReport> {
    state.reconciler.schedule_all().await
}

/// Reconcile one list after it was saved
pub async fn schedule_for_list(state: &AppState, list_name: String) -> Result<ReconcileOutcome> {
    state.reconciler.schedule_for_list(&list_name).await
}

/// Called when a previously armed wake timer fires
pub async fn on_timer_fired(
    state: &AppState,
    list_name: String,
    item_payload: String,
    notice_interval_days: u32,
) -> Result<Option<Notification>> {
    let payload = TimerPayload {
        list_name,
        item_data: item_payload,
        notice_interval_days,
    };

    state.aggregator.on_timer_fired(&payload).await
}

/// One line of a list's pending notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReminderInfo {
    pub item_name: String,
    pub trigger_at: NaiveDateTime,
    pub notice_interval_days: u32,
    pub time_left: String,
}

/// Reminders currently aggregated for a list, oldest trigger first
pub async fn pending_reminders(
    state: &AppState,
    list_name: String,
) -> Result<Vec<PendingReminderInfo>> {
    let pending = state.aggregator.pending().pending_for(&list_name).await;

    Ok(pending
        .into_iter()
        .map(|(item_name, reminder)| PendingReminderInfo {
            item_name,
            trigger_at: reminder.trigger_at,
            notice_interval_days: reminder.notice_interval_days,
            time_left: format_time_left(reminder.notice_interval_days),
        })
        .collect())
}

/// Forget a list's pending reminders, e.g. once the user opened it
pub async fn dismiss_reminders(state: &AppState, list_name: String) -> Result<()> {
    state.aggregator.pending().clear(&list_name).await;
    tracing::debug!("Dismissed pending reminders for '{}'", list_name);
    Ok(())
}
