//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::DEFAULT_RECOVERY_FREQUENCY;
use crate::error::{AppError, Result};
use crate::services::recovery::RecoveryFrequency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Permission grants on this host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// Whether notifications may be posted
    #[serde(default = "default_true")]
    pub notifications_granted: bool,
    /// Whether exact wake timers may be armed
    #[serde(default = "default_true")]
    pub exact_timers_granted: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            notifications_granted: true,
            exact_timers_granted: true,
        }
    }
}

/// Periodic recovery pass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// "30m", "12h", "1d", "daily", "weekly"
    #[serde(default = "default_recovery_frequency")]
    pub frequency: String,
}

fn default_recovery_frequency() -> String {
    DEFAULT_RECOVERY_FREQUENCY.to_string()
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: default_recovery_frequency(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub permissions: PermissionSettings,
    #[serde(default)]
    pub recovery: RecoverySettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Settings(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Get permission settings
    pub async fn get_permissions(&self) -> Result<PermissionSettings> {
        let settings = self.load().await?;
        Ok(settings.permissions)
    }

    /// Update permission settings
    pub async fn update_permissions(&self, permissions: PermissionSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.permissions = permissions;
        self.save(&settings).await?;
        Ok(())
    }

    /// Get recovery settings
    pub async fn get_recovery(&self) -> Result<RecoverySettings> {
        let settings = self.load().await?;
        Ok(settings.recovery)
    }

    /// Update recovery settings; the frequency must parse
    pub async fn update_recovery(&self, recovery: RecoverySettings) -> Result<()> {
        recovery
            .frequency
            .parse::<RecoveryFrequency>()
            .map_err(AppError::Settings)?;

        let mut settings = self.load().await?;
        settings.recovery = recovery;
        self.save(&settings).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_default_settings_created_on_load() {
        let (service, temp) = create_test_service();

        let settings = service.load().await.unwrap();

        assert!(settings.permissions.notifications_granted);
        assert!(settings.permissions.exact_timers_granted);
        assert!(settings.recovery.enabled);
        assert_eq!(settings.recovery.frequency, "12h");
        assert!(temp.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let (service, temp) = create_test_service();

        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"permissions": {"exact_timers_granted": false}}"#,
        )
        .unwrap();

        let settings = service.load().await.unwrap();
        assert!(settings.permissions.notifications_granted);
        assert!(!settings.permissions.exact_timers_granted);
        assert_eq!(settings.recovery.frequency, "12h");
    }

    #[tokio::test]
    async fn test_recovery_update_validates_frequency() {
        let (service, _temp) = create_test_service();

        let result = service
            .update_recovery(RecoverySettings {
                enabled: true,
                frequency: "fortnightly".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Settings(_))));

        service
            .update_recovery(RecoverySettings {
                enabled: false,
                frequency: "6h".to_string(),
            })
            .await
            .unwrap();

        let loaded = service.get_recovery().await.unwrap();
        assert!(!loaded.enabled);
        assert_eq!(loaded.frequency, "6h");
    }

    #[tokio::test]
    async fn test_permissions_preserved_after_recovery_update() {
        let (service, _temp) = create_test_service();

        service
            .update_permissions(PermissionSettings {
                notifications_granted: false,
                exact_timers_granted: true,
            })
            .await
            .unwrap();
        service
            .update_recovery(RecoverySettings::default())
            .await
            .unwrap();

        let permissions = service.get_permissions().await.unwrap();
        assert!(!permissions.notifications_granted);
    }

    #[tokio::test]
    async fn test_corrupt_settings_file_is_an_error() {
        let (service, temp) = create_test_service();
        std::fs::write(temp.path().join("settings.json"), "not json").unwrap();

        assert!(matches!(service.load().await, Err(AppError::Settings(_))));
    }
}
