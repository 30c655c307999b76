//! Authorization exchange: turns an authorization code or a refresh token into
//! a fresh `TokenRecord` via the provider's token endpoint.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::providers::OAuthProvider;
use crate::store::TokenRecord;

pub struct AuthExchange {
    provider: Arc<dyn OAuthProvider>,
    redirect_uri: String,
}

impl AuthExchange {
    pub fn new(provider: Arc<dyn OAuthProvider>, redirect_uri: impl Into<String>) -> Self {
        Self {
            provider,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Exchange a one-time authorization code. One-time use is enforced by the provider.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, RelayError> {
        debug!(provider = self.provider.id(), "exchanging authorization code");
        let tokens = self
            .provider
            .exchange_code(code, &self.redirect_uri)
            .await?;
        let record = TokenRecord::from_token_set(tokens, Utc::now(), None);
        info!(
            provider = self.provider.id(),
            expires_at = %record.expires_at,
            has_refresh_token = record.refresh_token.is_some(),
            "authorization code exchanged"
        );
        Ok(record)
    }

    /// Refresh `current`. The old refresh token survives only if the provider omits a new one.
    ///
    /// Fails with `NotAuthenticated` when there is no record, and with
    /// `AuthExchange` (without touching the network) when the record has no
    /// refresh token to spend.
    pub async fn refresh(&self, current: Option<&TokenRecord>) -> Result<TokenRecord, RelayError> {
        let current = current.ok_or(RelayError::NotAuthenticated)?;
        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            RelayError::auth_exchange(
                None,
                "no refresh token on record; re-run the authorization flow",
            )
        })?;

        debug!(provider = self.provider.id(), "refreshing access token");
        let tokens = self.provider.refresh_token(refresh_token).await?;
        let record = TokenRecord::from_token_set(tokens, Utc::now(), Some(refresh_token));
        info!(
            provider = self.provider.id(),
            expires_at = %record.expires_at,
            rotated = record.refresh_token.as_deref() != Some(refresh_token),
            "access token refreshed"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{token_set, MockProvider};
    use chrono::Duration;

    fn exchange(mock: &Arc<MockProvider>) -> AuthExchange {
        AuthExchange::new(mock.clone(), "http://localhost:3000/auth/callback")
    }

    #[tokio::test]
    async fn test_exchange_code_computes_expiry() {
        let mock = Arc::new(MockProvider::new());
        mock.push_exchange(Ok(token_set("A1", Some("R1"), 3600)));

        let before = Utc::now();
        let record = exchange(&mock).exchange_code("validcode").await.unwrap();
        let after = Utc::now();

        assert_eq!(record.access_token, "A1");
        assert_eq!(record.refresh_token.as_deref(), Some("R1"));
        assert!(record.expires_at >= before + Duration::seconds(3600));
        assert!(record.expires_at <= after + Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_exchange_failure_propagates() {
        let mock = Arc::new(MockProvider::new());
        mock.push_exchange(Err(RelayError::auth_exchange(Some(400), "invalid_grant")));

        let err = exchange(&mock).exchange_code("used").await.unwrap_err();
        assert!(matches!(err, RelayError::AuthExchange { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_refresh_without_record_is_not_authenticated() {
        let mock = Arc::new(MockProvider::new());
        let err = exchange(&mock).refresh(None).await.unwrap_err();
        assert!(matches!(err, RelayError::NotAuthenticated));
        assert_eq!(mock.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_skips_network() {
        let mock = Arc::new(MockProvider::new());
        let record = TokenRecord {
            access_token: "A1".into(),
            refresh_token: None,
            expires_at: Utc::now(),
        };
        let err = exchange(&mock).refresh(Some(&record)).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthExchange { status: None, .. }));
        assert_eq!(mock.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token_when_omitted() {
        let mock = Arc::new(MockProvider::new());
        mock.push_refresh(Ok(token_set("A2", None, 3600)));
        let record = TokenRecord {
            access_token: "A1".into(),
            refresh_token: Some("R1".into()),
            expires_at: Utc::now() - Duration::milliseconds(1000),
        };

        let refreshed = exchange(&mock).refresh(Some(&record)).await.unwrap();
        assert_eq!(refreshed.access_token, "A2");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("R1"));
        let expected = Utc::now() + Duration::seconds(3600);
        assert!((refreshed.expires_at - expected).num_seconds().abs() <= 2);
    }
}
