//! Services module
//!
//! Reminder planning, reconciliation, aggregation and recovery, plus the
//! settings file that configures them.

pub mod aggregator;
pub mod planner;
pub mod reconciler;
pub mod recovery;
pub mod settings;

pub use aggregator::{NotificationAggregator, PendingReminder, PendingReminders};
pub use planner::{plan, PlannedEvents};
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler, ScanReport};
pub use recovery::{RecoveryFrequency, RecoveryService};
pub use settings::{AppSettings, PermissionSettings, RecoverySettings, SettingsService};
