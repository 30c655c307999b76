//! Token lifecycle: hands out a currently-valid access token, refreshing it
//! first when it is inside the skew window.

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::credentials::{CredentialStatus, CredentialStore, TokenRecord, DEFAULT_IDENTITY};
use crate::auth::AuthExchange;
use crate::error::RelayError;

/// Default safety margin before `expires_at` at which a token counts as stale.
pub const DEFAULT_SKEW: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Owns the credential store for one identity and keeps its access token fresh.
///
/// Refreshes are serialized: concurrent callers that find the token stale
/// queue on `refresh_lock`, and whoever gets it second re-reads the store and
/// reuses the token the first one minted.
pub struct TokenManager {
    identity: String,
    store: CredentialStore,
    exchange: AuthExchange,
    skew: Duration,
    clear_on_refresh_failure: bool,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(exchange: AuthExchange) -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            store: CredentialStore::new(),
            exchange,
            skew: Duration::seconds(DEFAULT_SKEW.as_secs() as i64),
            clear_on_refresh_failure: true,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Replace the skew window. The value is used as given; range checks live in `Config`.
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Whether a failed refresh drops the record (fail fast) or leaves the stale one in place.
    pub fn with_clear_on_refresh_failure(mut self, clear: bool) -> Self {
        self.clear_on_refresh_failure = clear;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Exchange an authorization code and seed the store, replacing any previous record.
    pub async fn complete_authorization(&self, code: &str) -> Result<TokenRecord, RelayError> {
        let record = self.exchange.exchange_code(code).await?;
        // Hold the refresh lock so an in-flight refresh cannot overwrite the new grant.
        let _guard = self.refresh_lock.lock().await;
        self.store.set(&self.identity, record.clone()).await;
        Ok(record)
    }

    /// Presence check for health/status reporting; never refreshes.
    pub async fn is_authenticated(&self) -> bool {
        self.store.contains(&self.identity).await
    }

    pub async fn status(&self) -> CredentialStatus {
        self.store.status(&self.identity).await
    }

    /// Return an access token that is valid for at least the skew window.
    ///
    /// Makes zero network calls when there is no record or the stored token is
    /// fresh, and at most one refresh call otherwise. Refresh failures are
    /// returned unchanged and never retried.
    pub async fn get_valid_access_token(&self) -> Result<String, RelayError> {
        let record = self
            .store
            .get(&self.identity)
            .await
            .ok_or(RelayError::NotAuthenticated)?;
        if !record.is_stale(Utc::now(), self.skew) {
            return Ok(record.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed (or cleared) while we waited.
        let record = self
            .store
            .get(&self.identity)
            .await
            .ok_or(RelayError::NotAuthenticated)?;
        if !record.is_stale(Utc::now(), self.skew) {
            debug!("token refreshed by a concurrent caller");
            return Ok(record.access_token);
        }

        match self.exchange.refresh(Some(&record)).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                self.store.set(&self.identity, fresh).await;
                Ok(token)
            }
            Err(e) => {
                if self.clear_on_refresh_failure {
                    warn!(identity = %self.identity, "token refresh failed, clearing credentials: {e}");
                    self.store.remove(&self.identity).await;
                } else {
                    warn!(identity = %self.identity, "token refresh failed, keeping stale credentials: {e}");
                }
                Err(e)
            }
        }
    }
}
