//! Hosted auth API client (`/auth/v1`).
//!
//! ARCHITECTURE
//! ============
//! Thin HTTP wrapper for password sign-in, sign-up, logout and token refresh.
//! The client owns the current session (memory plus optional `SessionFile`)
//! and broadcasts every change to subscribers, which is how the store learns
//! about sign-ins. Pure parsing in `parse_session`, `parse_sign_up` and
//! `parse_error` for testability.
//!
//! TRADE-OFFS
//! ==========
//! Session reads and refreshes are serialized behind one async mutex, so two
//! callers racing on an expired session refresh it once.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::config::{HttpTimeouts, SupabaseConfig};
use super::storage::SessionFile;
use crate::provider::{AuthSubscription, IdentityProvider, ProviderError};
use crate::session::{AuthChangeEvent, AuthEvent, AuthOutcome, Credentials, Session, SessionUser};

/// Refresh sessions that expire within this many seconds.
pub const EXPIRY_MARGIN_SECS: i64 = 10;
const EVENT_CHANNEL_CAPACITY: usize = 16;

pub(crate) fn build_http(timeouts: HttpTimeouts) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Default)]
struct SessionSlot {
    /// Whether the persisted file has been consulted yet.
    loaded: bool,
    session: Option<Session>,
}

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    storage: Option<SessionFile>,
    slot: Mutex<SessionSlot>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    /// Build a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_http(build_http(config.timeouts)?, config))
    }

    /// Build a client that shares an existing HTTP client.
    #[must_use]
    pub fn with_http(http: reqwest::Client, config: &SupabaseConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            base_url: config.auth_url(),
            anon_key: config.anon_key.clone(),
            storage: config.session_file.clone().map(SessionFile::new),
            slot: Mutex::new(SessionSlot::default()),
            events,
        }
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        debug!(event = event.as_str(), subscribers = self.events.receiver_count(), "auth event");
        // No subscribers is fine; the state is still recorded in the slot.
        let _ = self.events.send(AuthEvent { event, session });
    }

    async fn post(&self, path_and_query: &str, bearer: &str, body: &Value) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}{path_and_query}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), status.canonical_reason(), &text));
        }
        Ok(text)
    }

    /// Make `session` current: memory, file, then broadcast.
    async fn store_session(&self, slot: &mut SessionSlot, session: Session, event: AuthChangeEvent) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(&session).await {
                warn!(error = %e, "failed to persist session");
            }
        }
        slot.loaded = true;
        slot.session = Some(session.clone());
        self.emit(event, Some(session));
    }

    async fn drop_session(&self, slot: &mut SessionSlot) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove().await {
                warn!(error = %e, "failed to remove persisted session");
            }
        }
        slot.loaded = true;
        slot.session = None;
        self.emit(AuthChangeEvent::SignedOut, None);
    }

    async fn load_persisted(&self, slot: &mut SessionSlot) {
        if slot.loaded {
            return;
        }
        slot.loaded = true;
        let Some(storage) = &self.storage else {
            return;
        };
        match storage.load().await {
            Ok(session) => {
                debug!(found = session.is_some(), path = %storage.path().display(), "loaded persisted session");
                slot.session = session;
            }
            Err(e) => warn!(error = %e, "ignoring unreadable persisted session"),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let text = self.post("/token?grant_type=refresh_token", &self.anon_key, &body).await?;
        parse_session(&text, now_unix())
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let mut slot = self.slot.lock().await;
        self.load_persisted(&mut slot).await;

        let Some(current) = slot.session.clone() else {
            return Ok(None);
        };
        if !current.expires_within(now_unix(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(current));
        }

        debug!(user_id = %current.user.id, "session near expiry; refreshing");
        match self.refresh(&current.refresh_token).await {
            Ok(refreshed) => {
                info!(user_id = %refreshed.user.id, "session refreshed");
                self.store_session(&mut slot, refreshed.clone(), AuthChangeEvent::TokenRefreshed)
                    .await;
                Ok(Some(refreshed))
            }
            Err(e @ ProviderError::Api { .. }) => {
                warn!(error = %e, "refresh rejected; dropping session");
                self.drop_session(&mut slot).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError> {
        let body = serde_json::to_value(credentials).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let text = self.post("/token?grant_type=password", &self.anon_key, &body).await?;
        let session = parse_session(&text, now_unix())?;

        let mut slot = self.slot.lock().await;
        self.store_session(&mut slot, session.clone(), AuthChangeEvent::SignedIn)
            .await;
        Ok(AuthOutcome { user: Some(session.user.clone()), session: Some(session) })
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError> {
        let body = serde_json::to_value(credentials).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let text = self.post("/signup", &self.anon_key, &body).await?;
        let outcome = parse_sign_up(&text, now_unix())?;

        if let Some(session) = &outcome.session {
            let mut slot = self.slot.lock().await;
            self.store_session(&mut slot, session.clone(), AuthChangeEvent::SignedIn)
                .await;
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let mut slot = self.slot.lock().await;
        self.load_persisted(&mut slot).await;

        if let Some(session) = slot.session.clone() {
            match self
                .post("/logout?scope=global", &session.access_token, &Value::Object(serde_json::Map::new()))
                .await
            {
                Ok(_) => {}
                // The token is already invalid upstream; finish locally.
                Err(ProviderError::Api { status: 401 | 403 | 404, .. }) => {}
                Err(e) => return Err(e),
            }
        }

        self.drop_session(&mut slot).await;
        Ok(())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a token response into a session, stamping `expires_at` if missing.
pub(crate) fn parse_session(json: &str, now: i64) -> Result<Session, ProviderError> {
    let mut session: Session = serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;
    session.stamp_expiry(now);
    Ok(session)
}

/// Parse a sign-up response.
///
/// Auto-confirmed projects answer with a full session. Projects that require
/// email verification answer with the bare user, or `{ "user": .., "session": null }`.
pub(crate) fn parse_sign_up(json: &str, now: i64) -> Result<AuthOutcome, ProviderError> {
    let value: Value = serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

    if value.get("access_token").is_some() {
        let mut session: Session = serde_json::from_value(value).map_err(|e| ProviderError::Parse(e.to_string()))?;
        session.stamp_expiry(now);
        return Ok(AuthOutcome { user: Some(session.user.clone()), session: Some(session) });
    }

    let user_value = match value {
        Value::Object(mut map) if map.contains_key("user") => map.remove("user").unwrap_or(Value::Null),
        other => other,
    };
    let user: SessionUser = serde_json::from_value(user_value).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(AuthOutcome { user: Some(user), session: None })
}

/// Turn a non-success response into [`ProviderError::Api`].
///
/// The message comes from `msg`, `error_description`, `message` or `error`,
/// whichever appears first; otherwise the HTTP reason phrase.
pub(crate) fn parse_error(status: u16, reason: Option<&str>, body: &str) -> ProviderError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let text_field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);

    let message = ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| text_field(*key))
        .unwrap_or_else(|| reason.map_or_else(|| format!("HTTP {status}"), str::to_owned));
    let code = text_field("error_code").or_else(|| text_field("error"));

    ProviderError::Api { status, code, message }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
