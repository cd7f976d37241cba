//! Notification display
//!
//! A notification is keyed by `id`; showing one with an id that is already
//! on screen replaces it in place.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Rendered multi-line notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u32,
    pub channel: String,
    /// List the notification summarizes, so tapping it can open that list
    pub list_name: String,
    pub title: String,
    pub body: String,
    pub lines: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Notifier for headless hosts: renders through the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            id = notification.id,
            channel = %notification.channel,
            "Notification: {} - {}",
            notification.title,
            notification.body
        );
        for line in &notification.lines {
            tracing::info!(id = notification.id, "  {}", line);
        }
        Ok(())
    }
}
