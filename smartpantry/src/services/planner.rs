//! Reminder schedule planner
//!
//! Pure function from a list snapshot and the current time to the exact set
//! of reminder events that should exist for that list.

use crate::config::{NOTICE_INTERVALS_DAYS, SCHEDULE_LOOKBACK_MINUTES};
use crate::models::{reminder_trigger_at, EventId, EventKey, InventoryList, ReminderEvent};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// Planned events keyed by their persisted identity
pub type PlannedEvents = BTreeMap<EventId, ReminderEvent>;

/// Compute every reminder that should be armed for `list_name`.
///
/// An item inside its notice window gets one event per catalogue interval
/// that fits both its `days_notice` and the days left before expiration.
/// Expired items get nothing, and events more than the lookback in the past
/// are dropped. A `days_notice` of 0 never selects an interval.
pub fn plan(list_name: &str, list: &InventoryList, now: NaiveDateTime) -> PlannedEvents {
    let today = now.date();
    let earliest = now - Duration::minutes(SCHEDULE_LOOKBACK_MINUTES);
    let mut events = PlannedEvents::new();

    for item in &list.items {
        if item.is_expired(today) {
            continue;
        }

        let days_until = item.days_until_expiration(today);
        if days_until > i64::from(item.days_notice) {
            continue;
        }

        for &interval in NOTICE_INTERVALS_DAYS {
            if interval > item.days_notice || i64::from(interval) > days_until {
                break;
            }

            let Some(trigger_at) = reminder_trigger_at(item.exp_date, interval) else {
                continue;
            };

            if trigger_at <= earliest {
                tracing::debug!(
                    "Skipping {} day reminder for '{}': {} already passed",
                    interval,
                    item.name,
                    trigger_at
                );
                continue;
            }

            let event = ReminderEvent {
                key: EventKey {
                    list_name: list_name.to_string(),
                    item_name: item.name.clone(),
                    exp_date: item.exp_date,
                    notice_interval_days: interval,
                },
                trigger_at,
                item: item.clone(),
            };

            events.entry(event.id()).or_insert(event);
        }
    }

    events
}
