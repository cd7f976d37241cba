//! Settings-related commands
//!
//! Changes are persisted to `settings.json` and applied to the running
//! services straight away.

use crate::app::AppState;
use crate::error::Result;
use crate::platform::PermissionProvider;
use crate::services::{PermissionSettings, RecoveryService, RecoverySettings, ScanReport};

/// Permission grants currently in effect
pub async fn get_permissions(state: &AppState) -> Result<PermissionSettings> {
    Ok(state.permissions.snapshot())
}

/// Record new permission grants.
///
/// When everything is granted, lists skipped while the gate was closed are
/// scheduled right away; the scan report is returned.
pub async fn update_permissions(
    state: &AppState,
    permissions: PermissionSettings,
) -> Result<Option<ScanReport>> {
    state.settings.update_permissions(permissions.clone()).await?;
    state.permissions.update(&permissions);

    if !state.permissions.all_granted() {
        return Ok(None);
    }

    state.reconciler.schedule_all().await.map(Some)
}

/// Get recovery settings
pub async fn get_recovery_settings(state: &AppState) -> Result<RecoverySettings> {
    state.settings.get_recovery().await
}

/// Persist recovery settings and reschedule the periodic job
pub async fn update_recovery_settings(
    state: &AppState,
    recovery: &RecoveryService,
    settings: RecoverySettings,
) -> Result<()> {
    state.settings.update_recovery(settings.clone()).await?;
    recovery.apply(&settings).await
}
