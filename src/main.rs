use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roguevault::config::Config;
use roguevault::services::auth;
use roguevault::state::AppState;

/// Interval between expired-session sweeps.
const SESSION_GC_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("❌ Failed to initialize AppState: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("✅ AppState initialized");

    state.daily.start_scheduler().await;

    let cleanup_state = state.clone();
    let cleanup = tokio::spawn(async move {
        loop {
            tokio::time::sleep(SESSION_GC_INTERVAL).await;
            tracing::info!("🧹 Running scheduled cleanup of expired sessions...");
            match auth::purge_expired_sessions(&cleanup_state).await {
                Ok(_) => {
                    tracing::info!("✅ Cleanup job completed successfully");
                }
                Err(e) => {
                    tracing::error!("❌ Cleanup job failed: {}", e);
                }
            }
        }
    });

    tracing::info!("✅ Background cleanup job started (runs every hour)");
    tracing::info!("✅ All systems operational");

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutdown requested");

    cleanup.abort();
    state.daily.shutdown().await;

    Ok(())
}
