//! Application configuration constants
//!
//! Central location for reminder timing, key-value store keys,
//! storage layout and recovery defaults used throughout the application.

// ===== Reminder Timing =====

/// Days before expiration at which a reminder may fire, ascending.
/// Yearly steps continue up to ten years.
pub const NOTICE_INTERVALS_DAYS: &[u32] = &[
    1, 3, 7, 14, 30, 60, 90, 120, 150, 180, 365, 730, 1095, 1460, 1825, 2190, 2555, 2920, 3285,
    3650,
];

/// Hour of day (local time) at which every reminder fires
pub const REMINDER_HOUR: u32 = 15;

/// Minute of the hour at which every reminder fires
pub const REMINDER_MINUTE: u32 = 0;

/// Reminders whose trigger time is at most this far in the past are still scheduled.
/// Covers clock skew between planning and registration.
pub const SCHEDULE_LOOKBACK_MINUTES: i64 = 5;

/// Pending reminders older than this are pruned from the aggregated notification.
pub const PENDING_RETENTION_MINUTES: i64 = 60;

// ===== Key-Value Store Keys =====

/// Prefix of the per-list event-ID set key (`alarms_<list name>`)
pub const EVENT_SET_KEY_PREFIX: &str = "alarms_";

/// Global index of list names that have a persisted event-ID set
pub const EVENT_INDEX_KEY: &str = "all_alarm_keys";

/// User opted out of the notification permission preface
pub const KEY_DO_NOT_ASK_PERMISSIONS: &str = "dont_ask_permissions";

/// User opted out of the exact timer permission preface
pub const KEY_DO_NOT_ASK_EXACT: &str = "dont_ask_exact";

// ===== List Storage =====

/// Root folder for list snapshots inside the data directory
pub const LISTS_ROOT_DIR: &str = "Smart Inventory";

/// Sub folder holding one file per list
pub const LISTS_SUB_DIR: &str = "All Lists";

/// Extension of list snapshot files
pub const LIST_FILE_EXTENSION: &str = "json";

// ===== Notifications =====

/// Channel on which expiration reminders are posted
pub const EXPIRATION_CHANNEL_ID: &str = "EXPIRATION_CHANNEL";

// ===== Recovery =====

/// Default interval between recovery passes
pub const DEFAULT_RECOVERY_FREQUENCY: &str = "12h";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SMART_PANTRY_DATA_DIR";

/// Data directory used when the environment does not provide one
pub const DEFAULT_DATA_DIR: &str = "smart-pantry-data";
