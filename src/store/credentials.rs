//! In-memory credential store.
//!
//! Holds one `TokenRecord` per identity key. The relay runs a single identity
//! (`DEFAULT_IDENTITY`), but the map keeps the per-key logic identical if more
//! are ever added. Nothing is persisted; a restart means re-authorizing.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::providers::TokenSet;

/// Identity key used by the single-user relay.
pub const DEFAULT_IDENTITY: &str = "default";

/// Upper bound on `expires_in` so the expiry arithmetic cannot overflow.
const MAX_EXPIRES_IN_SECS: u64 = 10 * 365 * 24 * 3600;

/// Access/refresh token pair plus the instant the access token stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `issued_at + expires_in`, fixed when the token is issued.
    pub expires_at: DateTime<Utc>,
}

// Token values stay out of logs.
impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenRecord {
    /// Build a record from a token-endpoint response issued at `issued_at`.
    ///
    /// `previous_refresh` is kept only when the response omitted a refresh token.
    pub fn from_token_set(
        tokens: TokenSet,
        issued_at: DateTime<Utc>,
        previous_refresh: Option<&str>,
    ) -> Self {
        let expires_in = tokens.expires_in.min(MAX_EXPIRES_IN_SECS) as i64;
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: issued_at + Duration::milliseconds(expires_in * 1000),
        }
    }

    /// True once `now >= expires_at - skew`. A window reaching past the
    /// representable calendar range counts as stale.
    pub fn is_stale(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(skew)
            .map_or(true, |threshold| now >= threshold)
    }
}

/// Public view of the stored credential, safe to return from status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

/// Identity-keyed token storage. Writes are immediately visible to later reads.
#[derive(Default)]
pub struct CredentialStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, identity: &str) -> Option<TokenRecord> {
        self.records.read().await.get(identity).cloned()
    }

    /// Replace the record for `identity` unconditionally.
    pub async fn set(&self, identity: &str, record: TokenRecord) {
        self.records
            .write()
            .await
            .insert(identity.to_string(), record);
    }

    /// Drop the record, returning the store to the unauthenticated state.
    pub async fn remove(&self, identity: &str) -> Option<TokenRecord> {
        self.records.write().await.remove(identity)
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.records.read().await.contains_key(identity)
    }

    pub async fn status(&self, identity: &str) -> CredentialStatus {
        match self.records.read().await.get(identity) {
            Some(record) => CredentialStatus {
                authenticated: true,
                expires_at: Some(record.expires_at),
                has_refresh_token: record.refresh_token.is_some(),
            },
            None => CredentialStatus {
                authenticated: false,
                expires_at: None,
                has_refresh_token: false,
            },
        }
    }
}
