//! Test doubles for platform services
//!
//! Recording implementations of the clock, timer and notifier traits so
//! reconciliation and aggregation can be asserted call by call.

use crate::error::{AppError, Result};
use crate::models::{EventId, TimerPayload};
use crate::platform::{Clock, Notification, Notifier, TimerService};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clock that only moves when told to
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *lock(&self.now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCall {
    Set(EventId, NaiveDateTime),
    Cancel(EventId),
}

/// Timer service that records every call and never fires on its own
#[derive(Default)]
pub struct RecordingTimers {
    calls: Mutex<Vec<TimerCall>>,
    armed: Mutex<BTreeMap<EventId, (NaiveDateTime, TimerPayload)>>,
    refused: Mutex<BTreeSet<EventId>>,
}

impl RecordingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Ids successfully armed, in call order
    pub fn created(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TimerCall::Set(id, _) => Some(id),
                TimerCall::Cancel(_) => None,
            })
            .collect()
    }

    /// Ids cancelled, in call order
    pub fn cancelled(&self) -> Vec<EventId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TimerCall::Cancel(id) => Some(id),
                TimerCall::Set(..) => None,
            })
            .collect()
    }

    /// Currently armed timers
    pub fn armed(&self) -> BTreeMap<EventId, (NaiveDateTime, TimerPayload)> {
        lock(&self.armed).clone()
    }

    /// Make registration of `id` fail until [`RecordingTimers::allow_all`]
    pub fn refuse(&self, id: EventId) {
        lock(&self.refused).insert(id);
    }

    pub fn allow_all(&self) {
        lock(&self.refused).clear();
    }

    /// Forget every armed timer, as a process restart would
    pub fn drop_all_pending(&self) {
        lock(&self.armed).clear();
    }

    /// Remove and return a timer as if it had fired
    pub fn fire(&self, id: EventId) -> Option<TimerPayload> {
        lock(&self.armed).remove(&id).map(|(_, payload)| payload)
    }
}

#[async_trait]
impl TimerService for RecordingTimers {
    async fn set_exact_wake(
        &self,
        id: EventId,
        at: NaiveDateTime,
        payload: TimerPayload,
    ) -> Result<()> {
        if lock(&self.refused).contains(&id) {
            return Err(AppError::Timer(format!("registration of {} refused", id)));
        }

        lock(&self.armed).insert(id, (at, payload));
        lock(&self.calls).push(TimerCall::Set(id, at));
        Ok(())
    }

    async fn cancel(&self, id: EventId) {
        lock(&self.armed).remove(&id);
        lock(&self.calls).push(TimerCall::Cancel(id));
    }

    async fn is_pending(&self, id: EventId) -> bool {
        lock(&self.armed).contains_key(&id)
    }
}

/// Notifier that keeps every notification shown
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Notification> {
        lock(&self.shown).clone()
    }

    pub fn last(&self) -> Option<Notification> {
        lock(&self.shown).last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        lock(&self.shown).push(notification.clone());
        Ok(())
    }
}
