//! Permission state and prompt flow
//!
//! Reminders need two grants: posting notifications and arming exact
//! timers. Users can opt out of being asked again for either one; the
//! opt-outs persist in the key-value store.

use crate::config::{KEY_DO_NOT_ASK_EXACT, KEY_DO_NOT_ASK_PERMISSIONS};
use crate::error::Result;
use crate::services::settings::PermissionSettings;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard};

pub trait PermissionProvider: Send + Sync {
    fn notifications_granted(&self) -> bool;

    fn exact_timers_granted(&self) -> bool;

    fn all_granted(&self) -> bool {
        self.notifications_granted() && self.exact_timers_granted()
    }
}

/// Permissions as declared in the settings file.
///
/// Clones share one state, so an update is seen by every holder on its
/// next check.
#[derive(Debug, Clone, Default)]
pub struct SettingsPermissions {
    current: Arc<RwLock<PermissionSettings>>,
}

impl SettingsPermissions {
    pub fn new(notifications: bool, exact_timers: bool) -> Self {
        Self::from(&PermissionSettings {
            notifications_granted: notifications,
            exact_timers_granted: exact_timers,
        })
    }

    /// Replace the grants, e.g. after the user allowed them
    pub fn update(&self, settings: &PermissionSettings) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings.clone();
        tracing::info!("Permission state updated: {:?}", settings);
    }

    pub fn snapshot(&self) -> PermissionSettings {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, PermissionSettings> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl From<&PermissionSettings> for SettingsPermissions {
    fn from(settings: &PermissionSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(settings.clone())),
        }
    }
}

impl PermissionProvider for SettingsPermissions {
    fn notifications_granted(&self) -> bool {
        self.read().notifications_granted
    }

    fn exact_timers_granted(&self) -> bool {
        self.read().exact_timers_granted
    }
}

/// Preface the host should show before requesting a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionPrompt {
    NotificationsPreface,
    ExactTimerPreface,
}

impl PermissionPrompt {
    fn opt_out_key(self) -> &'static str {
        match self {
            PermissionPrompt::NotificationsPreface => KEY_DO_NOT_ASK_PERMISSIONS,
            PermissionPrompt::ExactTimerPreface => KEY_DO_NOT_ASK_EXACT,
        }
    }
}

/// Decide which preface, if any, to show next.
///
/// `force_show` ignores the stored opt-outs (used when the user opens the
/// permission screen explicitly).
pub async fn next_permission_prompt(
    permissions: &dyn PermissionProvider,
    store: &dyn KeyValueStore,
    force_show: bool,
) -> Result<Option<PermissionPrompt>> {
    let do_not_ask = store.get_bool(KEY_DO_NOT_ASK_PERMISSIONS, false).await?;
    if !force_show && do_not_ask {
        tracing::debug!("Permission prompt skipped due to user opt-out");
        return Ok(None);
    }

    if !permissions.notifications_granted() {
        return Ok(Some(PermissionPrompt::NotificationsPreface));
    }

    if permissions.exact_timers_granted() {
        return Ok(None);
    }

    let do_not_ask_exact = store.get_bool(KEY_DO_NOT_ASK_EXACT, false).await?;
    if !force_show && do_not_ask_exact {
        return Ok(None);
    }

    Ok(Some(PermissionPrompt::ExactTimerPreface))
}

/// Remember that the user does not want to see `prompt` again
pub async fn opt_out(store: &dyn KeyValueStore, prompt: PermissionPrompt) -> Result<()> {
    store.put_bool(prompt.opt_out_key(), true).await?;
    tracing::info!("User opted out of {:?}", prompt);
    Ok(())
}
