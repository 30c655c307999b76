use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_AUTH_BASE_URL: &str = "https://api.prod.whoop.com/oauth";
const DEFAULT_API_BASE_URL: &str = "https://api.prod.whoop.com/developer";
const DEFAULT_SCOPES: &str =
    "offline read:recovery read:sleep read:workout read:cycles read:profile read:body_measurement";

/// Largest accepted `TOKEN_SKEW_SECS`; WHOOP access tokens live for an hour.
const MAX_TOKEN_SKEW: Duration = Duration::from_secs(24 * 3600);

/// How client credentials are sent to the token endpoint.
///
/// WHOOP has accepted both across API generations, so this is configurable
/// rather than baked into the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuthMode {
    /// `client_id` / `client_secret` as `application/x-www-form-urlencoded` body fields.
    #[default]
    Form,
    /// `Authorization: Basic base64(client_id:client_secret)`.
    Basic,
}

impl FromStr for ClientAuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "form" | "client_secret_post" => Ok(ClientAuthMode::Form),
            "basic" | "client_secret_basic" => Ok(ClientAuthMode::Basic),
            other => bail!("unknown client auth mode '{other}' (expected 'form' or 'basic')"),
        }
    }
}

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── OAuth client ────────────────────────────────────────────────────
    pub client_id: String,
    pub client_secret: String,
    /// Fixed redirect URI registered with WHOOP.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub client_auth_mode: ClientAuthMode,

    // ── Upstream ────────────────────────────────────────────────────────
    /// Authorization server base; `/oauth2/auth` and `/oauth2/token` hang off it.
    pub auth_base_url: String,
    pub api_base_url: String,
    pub http_timeout: Duration,

    // ── Token lifecycle ─────────────────────────────────────────────────
    pub token_skew: Duration,
    pub clear_on_refresh_failure: bool,
    /// Zero disables the background refresh loop.
    pub refresh_interval: Duration,

    // ── State parameter ─────────────────────────────────────────────────
    /// Base64 HMAC key. `None` means a random key is generated at startup.
    pub state_secret: Option<String>,
    pub state_max_age: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an explicit variable map (tests, embedding).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let http_timeout =
            secs(&or("HTTP_TIMEOUT_SECS", "15")).context("Invalid HTTP_TIMEOUT_SECS")?;
        if http_timeout.is_zero() {
            bail!("Invalid HTTP_TIMEOUT_SECS: must be at least 1 second");
        }

        let token_skew = secs(&or("TOKEN_SKEW_SECS", "300")).context("Invalid TOKEN_SKEW_SECS")?;
        if token_skew > MAX_TOKEN_SKEW {
            bail!(
                "Invalid TOKEN_SKEW_SECS: {} exceeds the maximum of {}",
                token_skew.as_secs(),
                MAX_TOKEN_SKEW.as_secs()
            );
        }

        Ok(Config {
            host: or("HOST", "0.0.0.0"),
            port: or("PORT", "3000").parse().context("Invalid PORT")?,

            client_id: get("WHOOP_CLIENT_ID").context("WHOOP_CLIENT_ID is required")?,
            client_secret: get("WHOOP_CLIENT_SECRET")
                .context("WHOOP_CLIENT_SECRET is required")?,
            redirect_uri: or("REDIRECT_URI", "http://localhost:3000/auth/callback"),
            scopes: or("WHOOP_SCOPES", DEFAULT_SCOPES)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            client_auth_mode: or("CLIENT_AUTH_MODE", "form")
                .parse()
                .context("Invalid CLIENT_AUTH_MODE")?,

            auth_base_url: trim_base(or("WHOOP_AUTH_BASE_URL", DEFAULT_AUTH_BASE_URL)),
            api_base_url: trim_base(or("WHOOP_API_BASE_URL", DEFAULT_API_BASE_URL)),
            http_timeout,

            token_skew,
            clear_on_refresh_failure: parse_bool(&or("CLEAR_ON_REFRESH_FAILURE", "true"))
                .context("Invalid CLEAR_ON_REFRESH_FAILURE")?,
            refresh_interval: secs(&or("REFRESH_INTERVAL_SECS", "0"))
                .context("Invalid REFRESH_INTERVAL_SECS")?,

            state_secret: get("STATE_SECRET").filter(|s| !s.trim().is_empty()),
            state_max_age: secs(&or("STATE_MAX_AGE_SECS", "600"))
                .context("Invalid STATE_MAX_AGE_SECS")?,
        })
    }

    /// `{authServer}/oauth2/auth`
    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/auth", self.auth_base_url)
    }

    /// `{authServer}/oauth2/token`
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.auth_base_url)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn secs(value: &str) -> Result<Duration> {
    Ok(Duration::from_secs(value.trim().parse()?))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}
