//! List-related commands
//!
//! Saving or deleting a list keeps its reminders in step with the change.

use crate::app::AppState;
use crate::error::Result;
use crate::models::InventoryList;
use crate::services::{ReconcileOutcome, ScanReport};
use std::collections::BTreeSet;

/// Names of every stored list
pub async fn list_names(state: &AppState) -> Result<BTreeSet<String>> {
    state.lists.list_names().await
}

/// Load one list snapshot
pub async fn load_list(state: &AppState, name: String) -> Result<InventoryList> {
    state.lists.load(&name).await
}

/// Persist a list, then reconcile its reminders
pub async fn save_list(
    state: &AppState,
    name: String,
    list: InventoryList,
) -> Result<ReconcileOutcome> {
    state.lists.save(&name, &list).await?;
    tracing::info!("Saved list '{}' with {} item(s)", name, list.items.len());

    state.reconciler.schedule_for_list(&name).await
}

/// Delete a list, then rescan so its reminders are cancelled
pub async fn delete_list(state: &AppState, name: String) -> Result<ScanReport> {
    if state.lists.delete(&name).await? {
        tracing::info!("Deleted list '{}'", name);
    } else {
        tracing::warn!("List '{}' was not stored", name);
    }

    state.reconciler.schedule_all().await
}
