//! Optional background refresh loop.
//!
//! Ticks every `interval` and runs the manager's stale check, so the token is
//! refreshed ahead of traffic instead of on the first request after expiry.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::lifecycle::TokenManager;
use crate::error::RelayError;

/// Start the refresh loop. Returns immediately (without spawning) when `interval` is zero.
pub fn spawn_refresh_daemon(
    tokens: Arc<TokenManager>,
    interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    info!("Token refresh daemon started (interval: {}s)", interval.as_secs());
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            refresh_cycle(&tokens).await;
        }
    }))
}

/// One pass: refresh if stale, skip quietly if nobody has authorized yet.
pub async fn refresh_cycle(tokens: &TokenManager) {
    match tokens.get_valid_access_token().await {
        Ok(_) => debug!("refresh cycle: token valid"),
        Err(RelayError::NotAuthenticated) => debug!("refresh cycle: not authenticated"),
        Err(e) => error!("Refresh cycle error: {e}"),
    }
}
