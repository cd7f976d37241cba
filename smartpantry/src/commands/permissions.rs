//! Permission-related commands

use crate::app::AppState;
use crate::error::Result;
use crate::platform::permissions::{next_permission_prompt as next_prompt, opt_out};
use crate::platform::PermissionPrompt;

/// Which permission preface the host should show next, if any
pub async fn next_permission_prompt(
    state: &AppState,
    force_show: bool,
) -> Result<Option<PermissionPrompt>> {
    next_prompt(&state.permissions, state.store.as_ref(), force_show).await
}

/// The user chose "don't ask again" on a preface
pub async fn opt_out_of_prompt(state: &AppState, prompt: PermissionPrompt) -> Result<()> {
    opt_out(state.store.as_ref(), prompt).await
}
