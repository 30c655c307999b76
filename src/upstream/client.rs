//! Authorized GET access to the WHOOP developer API.
//!
//! Every call asks the `TokenManager` for a valid bearer token first. Data
//! failures map to `RelayError::UpstreamData`; a 401 here does not trigger a
//! refresh, the token manager is the only place that decides that.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use super::models::{BodyMeasurement, Cycle, Paginated, Recovery, Sleep, UserProfile, Workout};
use crate::error::RelayError;
use crate::store::TokenManager;

/// Largest page size WHOOP accepts on collection endpoints.
pub const MAX_PAGE_SIZE: u32 = 25;

pub struct WhoopApi {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl WhoopApi {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// GET `{base}{path}` with a bearer token and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RelayError> {
        self.get_optional(path, query).await?.ok_or_else(|| {
            RelayError::upstream(Some(StatusCode::NOT_FOUND.as_u16()), format!("{path} not found"))
        })
    }

    /// Like `get_json`, but a 404 becomes `None` (e.g. a cycle that is not scored yet).
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, RelayError> {
        let token = self.tokens.get_valid_access_token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "WHOOP API request");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::upstream(None, format!("{path} timed out"))
                } else {
                    RelayError::upstream(None, format!("{path} request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| RelayError::upstream(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            return Err(RelayError::upstream(Some(status.as_u16()), body));
        }

        serde_json::from_str(&body).map(Some).map_err(|e| {
            RelayError::upstream(
                Some(status.as_u16()),
                format!("unexpected {path} response: {e}"),
            )
        })
    }

    async fn first_page<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: u32,
    ) -> Result<Vec<T>, RelayError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let page: Paginated<T> = self
            .get_json(path, &[("limit", limit.to_string())])
            .await?;
        Ok(page.records)
    }

    pub async fn latest_recovery(&self) -> Result<Option<Recovery>, RelayError> {
        Ok(self.first_page("/v2/recovery", 1).await?.into_iter().next())
    }

    /// Most recent main sleep; naps are skipped.
    pub async fn latest_sleep(&self) -> Result<Option<Sleep>, RelayError> {
        let sleeps: Vec<Sleep> = self.first_page("/v2/activity/sleep", 5).await?;
        Ok(sleeps.into_iter().find(|s| !s.nap))
    }

    pub async fn latest_cycle(&self) -> Result<Option<Cycle>, RelayError> {
        Ok(self.first_page("/v2/cycle", 1).await?.into_iter().next())
    }

    pub async fn cycle_recovery(&self, cycle_id: i64) -> Result<Option<Recovery>, RelayError> {
        self.get_optional(&format!("/v2/cycle/{cycle_id}/recovery"), &[])
            .await
    }

    pub async fn cycle_sleep(&self, cycle_id: i64) -> Result<Option<Sleep>, RelayError> {
        self.get_optional(&format!("/v2/cycle/{cycle_id}/sleep"), &[])
            .await
    }

    pub async fn workouts(&self, limit: u32) -> Result<Vec<Workout>, RelayError> {
        self.first_page("/v2/activity/workout", limit).await
    }

    pub async fn profile(&self) -> Result<UserProfile, RelayError> {
        self.get_json("/v2/user/profile/basic", &[]).await
    }

    pub async fn body_measurement(&self) -> Result<Option<BodyMeasurement>, RelayError> {
        self.get_optional("/v2/user/measurement/body", &[]).await
    }
}
