use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{OAuthProvider, TokenSet};
use crate::config::{ClientAuthMode, Config};
use crate::error::RelayError;

/// WHOOP OAuth 2.0 provider.
///
/// Token lifetime: 1 hour.
/// Refresh: supported when the `offline` scope was granted; the refresh token
/// may be rotated on every refresh.
pub struct WhoopProvider {
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    auth_mode: ClientAuthMode,
    http: reqwest::Client,
}

// Raw token response from WHOOP's token endpoint
#[derive(Debug, Deserialize)]
struct WhoopTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
    token_type: Option<String>,
    scope: Option<String>,
}

impl WhoopProvider {
    /// `http` should carry the configured request timeout.
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
            auth_mode: config.client_auth_mode,
            http,
        }
    }

    /// POST the grant to the token endpoint, attaching client credentials per `auth_mode`.
    async fn request_tokens(&self, grant: &[(&str, &str)]) -> Result<TokenSet, RelayError> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        let mut req = self.http.post(&self.token_url);
        match self.auth_mode {
            ClientAuthMode::Form => {
                form.push(("client_id", self.client_id.as_str()));
                form.push(("client_secret", self.client_secret.as_str()));
            }
            ClientAuthMode::Basic => {
                req = req.basic_auth(&self.client_id, Some(&self.client_secret));
            }
        }

        let resp = req.form(&form).send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::auth_exchange(None, "token endpoint timed out")
            } else {
                RelayError::auth_exchange(None, format!("token request failed: {e}"))
            }
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RelayError::auth_exchange(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::auth_exchange(Some(status.as_u16()), body));
        }

        let token_resp: WhoopTokenResponse = serde_json::from_str(&body).map_err(|e| {
            RelayError::auth_exchange(
                Some(status.as_u16()),
                format!("malformed token response ({e}): {body}"),
            )
        })?;

        if token_resp.access_token.is_empty() {
            return Err(RelayError::auth_exchange(
                Some(status.as_u16()),
                "token response carried an empty access_token",
            ));
        }

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token.filter(|rt| !rt.is_empty()),
            expires_in: token_resp.expires_in,
            token_type: token_resp.token_type,
            scope: token_resp.scope,
        })
    }
}

#[async_trait]
impl OAuthProvider for WhoopProvider {
    fn id(&self) -> &str {
        "whoop"
    }

    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String {
        let scope_str = scopes.join(" ");
        format!(
            "{base}?response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            base = self.authorize_url,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, RelayError> {
        self.request_tokens(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, RelayError> {
        self.request_tokens(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", "offline"),
        ])
        .await
    }
}

/// Simple percent-encoding for URL parameters.
fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
