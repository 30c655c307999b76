//! API route handlers for whoop-relay.
//!
//! All handlers receive `SharedState` via Axum state extraction. Data routes
//! get their bearer token from the token manager through `WhoopApi`.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::upstream::client::MAX_PAGE_SIZE;
use crate::upstream::format::{self, TodayView};
use crate::SharedState;

const DEFAULT_WORKOUT_LIMIT: u32 = 10;

pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── OAuth ────────────────────────────────────────────────────────
        .route("/auth/whoop", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        // ── Data ─────────────────────────────────────────────────────────
        .route("/api/recovery", get(recovery))
        .route("/api/sleep", get(sleep))
        .route("/api/strain", get(strain))
        .route("/api/workouts", get(workouts))
        .route("/api/profile", get(profile))
        .route("/api/today", get(today))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

/// GET /status: liveness plus whether a WHOOP credential is held. Never refreshes.
async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    let credential = state.tokens.status().await;
    Json(json!({
        "status": "ok",
        "service": "whoop-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": credential.authenticated,
        "expires_at": credential.expires_at,
    }))
}

// =============================================================================
// OAuth
// =============================================================================

/// GET /auth/whoop: Redirect the user to WHOOP's consent screen.
async fn auth_start(State(state): State<SharedState>) -> Result<Response, RelayError> {
    let signed_state = state.states.issue()?;
    let auth_url = state.provider.auth_url(
        &state.config.scopes,
        &signed_state,
        &state.config.redirect_uri,
    );
    info!("Redirecting to WHOOP OAuth");
    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/callback: Exchange the authorization code and seed the credential store.
async fn auth_callback(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Response, RelayError> {
    if let Some(error) = q.error {
        let detail = match q.error_description {
            Some(desc) => format!("{error}: {desc}"),
            None => error,
        };
        warn!("WHOOP authorization denied: {detail}");
        return Err(RelayError::AuthorizationDenied(detail));
    }

    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| RelayError::BadRequest("authorization code missing".into()))?;
    let signed_state = q.state.ok_or(RelayError::InvalidState)?;
    state.states.verify(&signed_state)?;

    let record = state.tokens.complete_authorization(&code).await?;
    info!(expires_at = %record.expires_at, "WHOOP OAuth successful");

    Ok(Html(
        "<html><body style=\"font-family:sans-serif;text-align:center;padding:3em\">\
         <h1>WHOOP connected</h1>\
         <p>You can close this window and return to the app.</p>\
         </body></html>",
    )
    .into_response())
}

// =============================================================================
// Data
// =============================================================================

/// GET /api/recovery: latest recovery.
async fn recovery(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, RelayError> {
    let latest = state.api.latest_recovery().await?;
    Ok(Json(json!({ "data": latest.as_ref().map(format::recovery) })))
}

/// GET /api/sleep: latest main sleep.
async fn sleep(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, RelayError> {
    let latest = state.api.latest_sleep().await?;
    Ok(Json(json!({ "data": latest.as_ref().map(format::sleep) })))
}

/// GET /api/strain: current cycle strain.
async fn strain(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, RelayError> {
    let latest = state.api.latest_cycle().await?;
    Ok(Json(json!({ "data": latest.as_ref().map(format::strain) })))
}

#[derive(Deserialize)]
struct WorkoutsQuery {
    limit: Option<u32>,
}

/// GET /api/workouts?limit=N: recent workouts, newest first.
async fn workouts(
    State(state): State<SharedState>,
    Query(q): Query<WorkoutsQuery>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let limit = q.limit.unwrap_or(DEFAULT_WORKOUT_LIMIT);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(RelayError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let items: Vec<_> = state
        .api
        .workouts(limit)
        .await?
        .iter()
        .map(format::workout)
        .collect();
    Ok(Json(json!({ "data": items })))
}

/// GET /api/profile: basic profile with body measurements.
async fn profile(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, RelayError> {
    let user = state.api.profile().await?;
    let body = state.api.body_measurement().await?;
    Ok(Json(json!({ "data": format::profile(&user, body.as_ref()) })))
}

/// GET /api/today: latest cycle plus its nested recovery and sleep.
async fn today(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, RelayError> {
    let Some(cycle) = state.api.latest_cycle().await? else {
        return Ok(Json(json!({ "data": null })));
    };
    let recovery = state.api.cycle_recovery(cycle.id).await?;
    let sleep = state.api.cycle_sleep(cycle.id).await?;

    let view = TodayView {
        strain: format::strain(&cycle),
        recovery: recovery.as_ref().map(format::recovery),
        sleep: sleep.as_ref().map(format::sleep),
    };
    Ok(Json(json!({ "data": view })))
}
