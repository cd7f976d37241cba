// Smart Pantry - expiration reminder daemon
// Entry point and application setup

use anyhow::Context;
use smartpantry::services::RecoveryService;
use smartpantry::{app, commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartpantry=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Smart Pantry v{}", env!("CARGO_PKG_VERSION"));

    let (state, mut fired_rx) = app::setup(app::resolve_data_dir())
        .await
        .context("application setup failed")?;

    let recovery = RecoveryService::new(state.reconciler.clone()).await?;

    // Boot pass rebuilds every timer lost with the previous process
    let report = recovery.recover_all().await?;
    tracing::info!(
        "Boot recovery: {} lists reconciled, {} removed, {} failed",
        report.reconciled.len(),
        report.removed.len(),
        report.failed.len()
    );

    let recovery_settings = commands::get_recovery_settings(&state).await?;
    if let Err(e) = recovery.apply(&recovery_settings).await {
        tracing::error!(
            "Periodic recovery not scheduled for '{}': {}",
            recovery_settings.frequency,
            e
        );
    }
    recovery.start().await?;

    loop {
        tokio::select! {
            fired = fired_rx.recv() => {
                let Some(payload) = fired else {
                    tracing::warn!("Timer channel closed");
                    break;
                };

                if let Err(e) = commands::on_timer_fired(
                    &state,
                    payload.list_name,
                    payload.item_data,
                    payload.notice_interval_days,
                )
                .await
                {
                    tracing::error!("Dropped reminder firing: {}", e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    recovery.shutdown().await?;
    tracing::info!("Smart Pantry stopped");

    Ok(())
}
