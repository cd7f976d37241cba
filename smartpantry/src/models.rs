//! Domain models
//!
//! Inventory items and lists as stored in list snapshots, plus the
//! reminder event identity shared by the planner, reconciler and aggregator.

use crate::config::{REMINDER_HOUR, REMINDER_MINUTE};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single item in an inventory list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: u32,
    pub name: String,
    /// Scanned barcode, may be empty
    #[serde(default)]
    pub code: String,
    /// ISO-8601 calendar date (`YYYY-MM-DD`)
    pub exp_date: NaiveDate,
    pub quantity: u32,
    /// Days before `exp_date` the item enters its notice window
    pub days_notice: u32,
}

impl InventoryItem {
    /// First day of the notice window
    pub fn expiring_soon_date(&self) -> NaiveDate {
        self.exp_date
            .checked_sub_days(Days::new(u64::from(self.days_notice)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Expired on or before `today`
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.exp_date <= today
    }

    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        !self.is_expired(today) && today >= self.expiring_soon_date()
    }

    /// Whole days from `today` until expiration, negative once expired
    pub fn days_until_expiration(&self, today: NaiveDate) -> i64 {
        (self.exp_date - today).num_days()
    }
}

/// A named list snapshot. The name is the storage key, not part of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryList {
    #[serde(default)]
    pub perishable: bool,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

/// Stable 32-bit FNV-1a hash. Persisted event IDs depend on this never changing.
pub fn fnv1a_32(input: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    input.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    })
}

/// Identifier of one scheduled reminder timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u32);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(EventId)
    }
}

/// Composite identity of a reminder event.
///
/// Derived from list name, item name, expiration date and notice interval,
/// never from the item's numeric id: edits that leave these untouched keep
/// the same timer, anything else becomes cancel-old/create-new.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub list_name: String,
    pub item_name: String,
    pub exp_date: NaiveDate,
    pub notice_interval_days: u32,
}

impl EventKey {
    pub fn canonical(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.list_name, self.item_name, self.exp_date, self.notice_interval_days
        )
    }

    pub fn id(&self) -> EventId {
        EventId(fnv1a_32(&self.canonical()))
    }
}

/// One reminder the planner wants to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEvent {
    pub key: EventKey,
    pub trigger_at: NaiveDateTime,
    /// Snapshot of the item carried in the timer payload
    pub item: InventoryItem,
}

impl ReminderEvent {
    pub fn id(&self) -> EventId {
        self.key.id()
    }

    /// Payload handed to the timer service, decoded again at fire time
    pub fn payload(&self) -> crate::error::Result<TimerPayload> {
        Ok(TimerPayload {
            list_name: self.key.list_name.clone(),
            item_data: serde_json::to_string(&self.item)?,
            notice_interval_days: self.key.notice_interval_days,
        })
    }
}

/// Data delivered back when a wake timer fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPayload {
    pub list_name: String,
    /// JSON-encoded `InventoryItem`
    pub item_data: String,
    pub notice_interval_days: u32,
}

/// Local time of day at which reminders fire
pub fn reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(REMINDER_HOUR, REMINDER_MINUTE, 0).unwrap_or(NaiveTime::MIN)
}

/// Trigger time for a reminder `notice_interval_days` before `exp_date`.
/// `None` when the date arithmetic leaves the representable range.
pub fn reminder_trigger_at(exp_date: NaiveDate, notice_interval_days: u32) -> Option<NaiveDateTime> {
    exp_date
        .checked_sub_days(Days::new(u64::from(notice_interval_days)))
        .map(|date| date.and_time(reminder_time()))
}

/// Stable id of the aggregated notification for a list
pub fn notification_id(list_name: &str) -> u32 {
    fnv1a_32(list_name)
}
