//! Users-table lookup over the hosted row-store API (`/rest/v1`).
//!
//! One point read per session: `GET /{table}?select={columns}&id=eq.{id}`
//! with the single-object media type, so zero rows come back as 406 rather
//! than an empty array.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::auth::build_http;
use super::config::SupabaseConfig;
use crate::provider::{ProfileError, ProfileStore, ProviderError};
use crate::session::{ProfileRow, Session};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub struct PostgrestProfiles {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    table: String,
    columns: String,
}

impl PostgrestProfiles {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_http(build_http(config.timeouts)?, config))
    }

    #[must_use]
    pub fn with_http(http: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            http,
            base_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
            table: config.profile_table.clone(),
            columns: config.profile_columns.clone(),
        }
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfiles {
    async fn fetch_profile(&self, session: &Session) -> Result<ProfileRow, ProfileError> {
        let user_id = session.user.id;
        debug!(%user_id, table = %self.table, "fetching profile row");

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, self.table))
            .query(&[("select", self.columns.clone()), ("id", format!("eq.{user_id}"))])
            .header("apikey", &self.anon_key)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| ProfileError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProfileError::Request(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_ACCEPTABLE {
            return Err(ProfileError::NotFound);
        }
        if !status.is_success() {
            return Err(ProfileError::Api { status: status.as_u16(), message: error_message(&text, status) });
        }
        parse_row(&text)
    }
}

/// Parse a single-object response body into a row.
pub(crate) fn parse_row(json: &str) -> Result<ProfileRow, ProfileError> {
    match serde_json::from_str::<Value>(json).map_err(|e| ProfileError::Parse(e.to_string()))? {
        Value::Object(row) => Ok(row),
        Value::Array(rows) if rows.is_empty() => Err(ProfileError::NotFound),
        other => Err(ProfileError::Parse(format!("expected object, got {other}"))),
    }
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned())
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
