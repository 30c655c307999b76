//! Scripted in-process provider for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{OAuthProvider, TokenSet};
use crate::error::RelayError;

/// Returns queued responses in order and counts every call.
#[derive(Default)]
pub struct MockProvider {
    exchanges: Mutex<VecDeque<Result<TokenSet, RelayError>>>,
    refreshes: Mutex<VecDeque<Result<TokenSet, RelayError>>>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
}

pub fn token_set(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in,
        token_type: Some("bearer".to_string()),
        scope: Some("offline".to_string()),
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend inside every refresh so concurrent callers can pile up.
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn push_exchange(&self, result: Result<TokenSet, RelayError>) -> &Self {
        self.exchanges.lock().unwrap().push_back(result);
        self
    }

    pub fn push_refresh(&self, result: Result<TokenSet, RelayError>) -> &Self {
        self.refreshes.lock().unwrap().push_back(result);
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.exchange_calls() + self.refresh_calls()
    }
}

fn exhausted() -> Result<TokenSet, RelayError> {
    Err(RelayError::auth_exchange(None, "mock provider has no scripted response"))
}

#[async_trait]
impl OAuthProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn auth_url(&self, _scopes: &[String], state: &str, _redirect_uri: &str) -> String {
        format!("https://provider.test/oauth2/auth?state={state}")
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenSet, RelayError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.exchanges.lock().unwrap().pop_front();
        next.unwrap_or_else(exhausted)
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, RelayError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.refreshes.lock().unwrap().pop_front();
        next.unwrap_or_else(exhausted)
    }
}
