//! One-shot wake timers
//!
//! Contract: arming an id that is already armed replaces it, and cancelling
//! an unknown or already-fired id is a silent no-op.

use crate::error::{AppError, Result};
use crate::models::{EventId, TimerPayload};
use crate::platform::Clock;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[async_trait]
pub trait TimerService: Send + Sync {
    /// Arm a timer that delivers `payload` at local time `at`
    async fn set_exact_wake(&self, id: EventId, at: NaiveDateTime, payload: TimerPayload)
        -> Result<()>;

    /// Disarm a timer; unknown ids are ignored
    async fn cancel(&self, id: EventId);

    /// Whether the timer is still armed. Timers lost to a restart read `false`.
    async fn is_pending(&self, id: EventId) -> bool;
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerTable {
    next_generation: u64,
    armed: HashMap<EventId, ArmedTimer>,
}

/// In-process timers, one tokio task per armed id.
///
/// Firings are delivered on the channel returned by [`TokioTimerService::new`].
/// Timers do not survive the process; the recovery pass re-arms them.
#[derive(Clone)]
pub struct TokioTimerService {
    clock: Arc<dyn Clock>,
    table: Arc<Mutex<TimerTable>>,
    fired_tx: mpsc::UnboundedSender<TimerPayload>,
}

impl TokioTimerService {
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<TimerPayload>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let service = Self {
            clock,
            table: Arc::new(Mutex::new(TimerTable::default())),
            fired_tx,
        };
        (service, fired_rx)
    }

    fn table(&self) -> std::sync::MutexGuard<'_, TimerTable> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of timers currently armed
    pub fn armed_count(&self) -> usize {
        self.table().armed.len()
    }
}

#[async_trait]
impl TimerService for TokioTimerService {
    async fn set_exact_wake(
        &self,
        id: EventId,
        at: NaiveDateTime,
        payload: TimerPayload,
    ) -> Result<()> {
        if self.fired_tx.is_closed() {
            return Err(AppError::Timer(format!(
                "Cannot arm timer {}: firing channel closed",
                id
            )));
        }

        let delay = (at - self.clock.now()).to_std().unwrap_or_default();

        let mut table = self.table();
        table.next_generation += 1;
        let generation = table.next_generation;

        let fired_tx = self.fired_tx.clone();
        let timers = Arc::clone(&self.table);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut table = timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if table.armed.get(&id).map(|t| t.generation) == Some(generation) {
                    table.armed.remove(&id);
                }
            }

            tracing::debug!("Timer {} fired for list '{}'", id, payload.list_name);
            if fired_tx.send(payload).is_err() {
                tracing::warn!("Timer {} fired after the receiver was dropped", id);
            }
        });

        if let Some(previous) = table.armed.insert(id, ArmedTimer { generation, handle }) {
            previous.handle.abort();
        }

        tracing::debug!("Armed timer {} for {} (in {:?})", id, at, delay);
        Ok(())
    }

    async fn cancel(&self, id: EventId) {
        if let Some(timer) = self.table().armed.remove(&id) {
            timer.handle.abort();
            tracing::debug!("Cancelled timer {}", id);
        }
    }

    async fn is_pending(&self, id: EventId) -> bool {
        self.table()
            .armed
            .get(&id)
            .is_some_and(|timer| !timer.handle.is_finished())
    }
}
