use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// A set of tokens returned from the token endpoint after code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Providers may rotate the refresh token or omit it on refresh.
    pub refresh_token: Option<String>,
    /// Seconds from issuance.
    pub expires_in: u64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// The token-endpoint capability the credential lifecycle depends on.
///
/// Both operations hit the same endpoint with different grant types. Failures
/// are always `RelayError::AuthExchange` and are never retried here.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier (e.g. "whoop").
    fn id(&self) -> &str;

    /// Build the authorization URL that the user should be redirected to.
    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String;

    /// Exchange a one-time authorization code for tokens (`grant_type=authorization_code`).
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<TokenSet, RelayError>;

    /// Mint a new access token from a refresh token (`grant_type=refresh_token`).
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, RelayError>;
}
