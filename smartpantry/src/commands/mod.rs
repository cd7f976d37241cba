//! Entry points exposed to the host shell
//!
//! This module organizes commands into logical submodules:
//! - `lists`: List snapshot storage, each change followed by reconciliation
//! - `reminders`: Scheduling passes and timer firings
//! - `permissions`: Permission preface flow
//! - `settings`: Permission grants and recovery schedule

pub mod lists;
pub mod permissions;
pub mod reminders;
pub mod settings;

use crate::app::AppState;
use crate::error::Result;
use serde::Serialize;

// Re-export all commands for convenient use from main.rs and hosts
pub use lists::*;
pub use permissions::*;
pub use reminders::*;
pub use settings::*;

/// Get application information
pub async fn get_app_info(state: &AppState) -> Result<AppInfo> {
    Ok(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
    })
}

/// Application information structure
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
}
