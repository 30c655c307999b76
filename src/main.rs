use anyhow::{Context, Result};
use tracing::{info, warn};

use whoop_relay::{api, store, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whoop_relay=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env().context("invalid relay configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        auth_mode = ?config.client_auth_mode,
        skew_secs = config.token_skew.as_secs(),
        "whoop-relay starting"
    );
    if config.state_secret.is_none() {
        warn!("STATE_SECRET not set; pending authorizations will not survive a restart");
    }

    let bind_addr = format!("{}:{}", config.host, config.port);
    let refresh_interval = config.refresh_interval;
    let state = AppState::from_config(config)?;

    // None when REFRESH_INTERVAL_SECS=0
    let daemon = store::spawn_refresh_daemon(state.tokens.clone(), refresh_interval);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("Listening on {bind_addr} (authorize at /auth/whoop)");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    if let Some(handle) = daemon {
        handle.abort();
    }
    Ok(())
}
