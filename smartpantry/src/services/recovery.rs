/// Recovery Service
/// Re-runs the full reminder scan on a cron schedule so timers lost to a
/// restart or clock change are rebuilt, and deleted lists are cleaned up.
use crate::error::{AppError, Result};
use crate::services::reconciler::{Reconciler, ScanReport};
use crate::services::settings::RecoverySettings;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// How often the recovery scan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryFrequency {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl RecoveryFrequency {
    /// Six-field cron expression (seconds first)
    pub fn to_cron(self) -> String {
        match self {
            RecoveryFrequency::Minutes(1) => "0 * * * * *".to_string(),
            RecoveryFrequency::Minutes(m) => format!("0 */{} * * * *", m),
            RecoveryFrequency::Hours(1) => "0 0 * * * *".to_string(),
            RecoveryFrequency::Hours(h) => format!("0 0 */{} * * *", h),
            // Just after midnight so the new day's reminders are armed early
            RecoveryFrequency::Days(1) => "0 5 0 * * *".to_string(),
            RecoveryFrequency::Days(d) => format!("0 5 0 */{} * *", d),
        }
    }
}

impl FromStr for RecoveryFrequency {
    type Err = String;

    /// Accepts a count and unit (`30m`, `12h`, `2d`) or a named period.
    /// Whole hours and whole days are normalized so the cron step stays in
    /// range: `120m` is two hours, `48h` is two days.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let spec = s.trim().to_ascii_lowercase();

        let named = match spec.as_str() {
            "hourly" => Some(RecoveryFrequency::Hours(1)),
            "daily" => Some(RecoveryFrequency::Days(1)),
            "weekly" => Some(RecoveryFrequency::Days(7)),
            "monthly" => Some(RecoveryFrequency::Days(30)),
            _ => None,
        };
        if let Some(frequency) = named {
            return Ok(frequency);
        }

        let unit_at = spec
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Frequency '{}' has no unit (m, h or d)", s))?;
        let (count, unit) = spec.split_at(unit_at);

        let count: u32 = count
            .parse()
            .map_err(|_| format!("Frequency '{}' must start with a count", s))?;
        if count == 0 {
            return Err("Frequency value must be greater than 0".to_string());
        }

        let frequency = match unit {
            "m" | "min" => RecoveryFrequency::Minutes(count),
            "h" => RecoveryFrequency::Hours(count),
            "d" => RecoveryFrequency::Days(count),
            other => return Err(format!("Unknown frequency unit '{}' in '{}'", other, s)),
        };

        frequency.normalized().ok_or_else(|| {
            format!("Frequency '{}' does not divide evenly into a schedule", s)
        })
    }
}

impl RecoveryFrequency {
    fn normalized(self) -> Option<Self> {
        match self {
            RecoveryFrequency::Minutes(m) if m < 60 => Some(self),
            RecoveryFrequency::Minutes(m) if m % 60 == 0 => {
                RecoveryFrequency::Hours(m / 60).normalized()
            }
            RecoveryFrequency::Hours(h) if h < 24 => Some(self),
            RecoveryFrequency::Hours(h) if h % 24 == 0 => Some(RecoveryFrequency::Days(h / 24)),
            RecoveryFrequency::Days(_) => Some(self),
            _ => None,
        }
    }
}

/// Periodic and on-demand recovery of reminder timers
pub struct RecoveryService {
    scheduler: Arc<RwLock<JobScheduler>>,
    reconciler: Reconciler,
    current_job_id: Arc<RwLock<Option<Uuid>>>,
}

impl RecoveryService {
    pub async fn new(reconciler: Reconciler) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            reconciler,
            current_job_id: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Recovery scheduler started");
        Ok(())
    }

    /// One recovery pass. Used at boot, after a clock change and by the job.
    pub async fn recover_all(&self) -> Result<ScanReport> {
        tracing::info!("Running reminder recovery");
        self.reconciler.schedule_all().await
    }

    /// Reschedule the periodic job from the recovery settings
    pub async fn apply(&self, settings: &RecoverySettings) -> Result<()> {
        let frequency = settings
            .frequency
            .parse::<RecoveryFrequency>()
            .map_err(AppError::Settings)?;
        self.schedule(frequency, settings.enabled).await
    }

    /// Replace the periodic recovery job
    pub async fn schedule(&self, frequency: RecoveryFrequency, enabled: bool) -> Result<()> {
        self.cancel().await?;

        if !enabled {
            tracing::info!("Periodic reminder recovery disabled");
            return Ok(());
        }

        let cron_expr = frequency.to_cron();
        let reconciler = self.reconciler.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let reconciler = reconciler.clone();
            Box::pin(async move {
                tracing::info!("Running scheduled reminder recovery");
                match reconciler.schedule_all().await {
                    Ok(report) => tracing::info!(
                        "Scheduled recovery done: {} lists reconciled, {} failed",
                        report.reconciled.len(),
                        report.failed.len()
                    ),
                    Err(e) => tracing::error!("Scheduled recovery failed: {}", e),
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create recovery job: {}", e)))?;

        let job_id = job.guid();

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to schedule job: {}", e)))?;

        *self.current_job_id.write().await = Some(job_id);

        tracing::info!("Reminder recovery scheduled: {:?} ({})", frequency, cron_expr);
        Ok(())
    }

    pub async fn cancel(&self) -> Result<()> {
        let mut current_job = self.current_job_id.write().await;

        if let Some(job_id) = *current_job {
            let scheduler = self.scheduler.write().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Scheduler(format!("Failed to remove job: {}", e)))?;

            *current_job = None;
            tracing::info!("Reminder recovery schedule cancelled");
        }

        Ok(())
    }

    pub async fn is_scheduled(&self) -> bool {
        self.current_job_id.read().await.is_some()
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Recovery scheduler shutdown");
        Ok(())
    }
}
