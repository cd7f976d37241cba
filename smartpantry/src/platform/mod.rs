//! Platform services
//!
//! Capabilities the reminder core consumes from the host: wall clock,
//! one-shot wake timers, notification display and permission state.
//! Each is a trait so the host (or a test) can supply its own.

pub mod clock;
pub mod notifications;
pub mod permissions;
pub mod timers;

pub use clock::{Clock, SystemClock};
pub use notifications::{LogNotifier, Notification, Notifier};
pub use permissions::{PermissionPrompt, PermissionProvider, SettingsPermissions};
pub use timers::{TimerService, TokioTimerService};
