pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod store;
pub mod upstream;

pub use config::Config;
pub use error::RelayError;

use std::sync::Arc;

use auth::AuthExchange;
use crypto::StateSigner;
use providers::{OAuthProvider, WhoopProvider};
use store::TokenManager;
use upstream::WhoopApi;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn OAuthProvider>,
    pub tokens: Arc<TokenManager>,
    pub api: WhoopApi,
    pub states: StateSigner,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the provider, token manager and data client from configuration.
    pub fn from_config(config: Config) -> Result<SharedState, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let skew = chrono::Duration::from_std(config.token_skew)
            .map_err(|e| RelayError::Internal(format!("Invalid token skew: {e}")))?;

        let provider: Arc<dyn OAuthProvider> = Arc::new(WhoopProvider::new(&config, http.clone()));
        let tokens = Arc::new(
            TokenManager::new(AuthExchange::new(provider.clone(), config.redirect_uri.clone()))
                .with_skew(skew)
                .with_clear_on_refresh_failure(config.clear_on_refresh_failure),
        );
        let api = WhoopApi::new(http, config.api_base_url.clone(), tokens.clone());
        let states = match &config.state_secret {
            Some(secret) => StateSigner::new(secret, config.state_max_age)?,
            None => StateSigner::random(config.state_max_age),
        };

        Ok(Arc::new(AppState {
            config,
            provider,
            tokens,
            api,
            states,
        }))
    }
}
