use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Upstream bodies are cut to this many characters before they end up in an error.
const MAX_UPSTREAM_BODY: usize = 512;

/// Unified error type for the whoop-relay service.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // ── Credential lifecycle ────────────────────────────────────────────
    /// No credential record exists; the user must run the authorization flow again.
    #[error("Not authenticated with WHOOP; visit /auth/whoop to connect")]
    NotAuthenticated,

    /// The token endpoint rejected an authorization-code exchange or a refresh.
    #[error("Token exchange failed{}: {body}", status_suffix(.status))]
    AuthExchange { status: Option<u16>, body: String },

    // ── Data proxy ──────────────────────────────────────────────────────
    /// A data fetch failed after a valid token was obtained. Never triggers a refresh.
    #[error("WHOOP API request failed{}: {body}", status_suffix(.status))]
    UpstreamData { status: Option<u16>, body: String },

    // ── Authorization redirect ──────────────────────────────────────────
    #[error("Authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Bad request: {0}")]
    BadRequest(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl RelayError {
    /// Build an `AuthExchange` error, truncating the upstream body.
    pub fn auth_exchange(status: Option<u16>, body: impl AsRef<str>) -> Self {
        RelayError::AuthExchange {
            status,
            body: truncate(body.as_ref()),
        }
    }

    /// Build an `UpstreamData` error, truncating the upstream body.
    pub fn upstream(status: Option<u16>, body: impl AsRef<str>) -> Self {
        RelayError::UpstreamData {
            status,
            body: truncate(body.as_ref()),
        }
    }

    /// Upstream HTTP status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::AuthExchange { status, .. } | RelayError::UpstreamData { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_UPSTREAM_BODY {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_UPSTREAM_BODY).collect();
    cut.push('…');
    cut
}

impl From<anyhow::Error> for RelayError {
    fn from(e: anyhow::Error) -> Self {
        RelayError::Internal(e.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            RelayError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            RelayError::AuthExchange { .. } => (StatusCode::UNAUTHORIZED, "auth_exchange_failed"),
            RelayError::UpstreamData { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            RelayError::AuthorizationDenied(_) => {
                (StatusCode::BAD_REQUEST, "authorization_denied")
            }
            RelayError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            RelayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RelayError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            RelayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let mut error = json!({
            "code": code,
            "message": self.to_string(),
        });
        if let Some(upstream) = self.upstream_status() {
            error["upstream_status"] = json!(upstream);
        }

        (status, axum::Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_exchange_message_includes_status() {
        let err = RelayError::auth_exchange(Some(400), "invalid_grant");
        assert_eq!(
            err.to_string(),
            "Token exchange failed (status 400): invalid_grant"
        );
        assert_eq!(err.upstream_status(), Some(400));
    }

    #[test]
    fn test_message_without_status() {
        let err = RelayError::upstream(None, "request timed out");
        assert_eq!(err.to_string(), "WHOOP API request failed: request timed out");
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let RelayError::AuthExchange { body, .. } = RelayError::auth_exchange(Some(500), body)
        else {
            panic!("wrong variant");
        };
        assert_eq!(body.chars().count(), MAX_UPSTREAM_BODY + 1);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RelayError::NotAuthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::auth_exchange(Some(400), "").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::upstream(Some(401), "").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RelayError::InvalidState.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
