//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::{DATA_DIR_ENV, DEFAULT_DATA_DIR};
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::models::TimerPayload;
use crate::platform::{
    Clock, LogNotifier, Notifier, PermissionProvider, SettingsPermissions, SystemClock,
    TimerService, TokioTimerService,
};
use crate::services::{NotificationAggregator, PendingReminders, Reconciler, SettingsService};
use crate::storage::{FileListStore, KeyValueStore, ListStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: SettingsService,
    pub lists: Arc<dyn ListStore>,
    pub store: Arc<dyn KeyValueStore>,
    pub permissions: SettingsPermissions,
    pub reconciler: Reconciler,
    pub aggregator: NotificationAggregator,
}

impl AppState {
    /// Wire the services from already-built platform parts
    pub fn new(
        app_data_dir: PathBuf,
        lists: Arc<dyn ListStore>,
        store: Arc<dyn KeyValueStore>,
        timers: Arc<dyn TimerService>,
        permissions: SettingsPermissions,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reconciler = Reconciler::new(
            lists.clone(),
            store.clone(),
            timers,
            Arc::new(permissions.clone()),
            clock.clone(),
        );
        let aggregator = NotificationAggregator::new(PendingReminders::new(), notifier, clock);

        Self {
            settings: SettingsService::new(app_data_dir.clone()),
            app_data_dir,
            lists,
            store,
            permissions,
            reconciler,
            aggregator,
        }
    }
}

/// Data directory from the environment, or the default next to the binary
pub fn resolve_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Application setup - called once on startup.
///
/// Returns the state and the channel on which armed timers deliver their
/// payloads when they fire.
pub async fn setup(
    app_data_dir: PathBuf,
) -> Result<(AppState, mpsc::UnboundedReceiver<TimerPayload>)> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    std::fs::create_dir_all(&app_data_dir)?;

    let settings = SettingsService::new(app_data_dir.clone()).load().await?;

    let pool = create_pool(&app_data_dir.join("smartpantry.db")).await?;
    let store = Arc::new(Repository::new(pool));

    let lists = Arc::new(FileListStore::new(&app_data_dir));
    lists.initialize().await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (timers, fired_rx) = TokioTimerService::new(clock.clone());

    let permissions = SettingsPermissions::from(&settings.permissions);
    if !permissions.all_granted() {
        tracing::warn!("Reminder permissions not granted: {:?}", settings.permissions);
    }

    let state = AppState::new(
        app_data_dir,
        lists,
        store,
        Arc::new(timers),
        permissions,
        Arc::new(LogNotifier),
        clock,
    );

    tracing::info!("Application initialized successfully");

    Ok((state, fired_rx))
}
