//! Session and profile data model.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Session` and `SessionUser` mirror what the hosted auth provider returns.
//! `UserProfile` is derived locally: the session user overlaid with the row
//! fetched from the users table, which is where the admin `role` lives.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A row from the users table, keyed by column name.
pub type ProfileRow = Map<String, Value>;

// =============================================================================
// SESSION
// =============================================================================

/// User record embedded in a provider session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Provider-assigned user identifier; primary key of the users table.
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Every other field the provider sent (`aud`, `role`, metadata, timestamps).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provider-issued session. Tokens are opaque to this crate.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, as reported at issue time.
    #[serde(default)]
    pub expires_in: u64,
    /// Absolute expiry as unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    /// True when the session expires within `margin_secs` of `now` (unix seconds).
    ///
    /// Sessions without an absolute expiry never count as expired.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at.saturating_sub(margin_secs) <= now)
    }

    /// Fill in `expires_at` from `expires_in` when the provider omitted it.
    pub fn stamp_expiry(&mut self, now: i64) {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(now.saturating_add(i64::try_from(self.expires_in).unwrap_or(i64::MAX)));
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

// =============================================================================
// AUTH EVENTS
// =============================================================================

/// Kind of session change pushed by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl AuthChangeEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

/// One provider push: the event name and the session it carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

// =============================================================================
// CREDENTIALS / OUTCOME
// =============================================================================

/// Email and password pair sent to the provider.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful result of a sign-in or sign-up call.
///
/// `session` is `None` when the provider still requires email verification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthOutcome {
    pub user: Option<SessionUser>,
    pub session: Option<Session>,
}

// =============================================================================
// USER PROFILE
// =============================================================================

/// Where a profile's row data came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProfileSource {
    /// The users-table row was fetched and merged.
    Fetched,
    /// The lookup failed; only session-user fields are present.
    Degraded { reason: String },
}

/// Session user merged with its users-table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    /// Always the session user's id.
    pub id: Uuid,
    pub email: Option<String>,
    /// The row's `role` column. `None` when absent, null, or not fetched.
    pub role: Option<String>,
    /// Session-user fields with row columns overlaid.
    pub attributes: Map<String, Value>,
    pub source: ProfileSource,
}

impl UserProfile {
    /// Overlay `row` onto the session user. Row columns win, except `id`.
    ///
    /// `email` is only overridden by a string; a null or missing row email
    /// keeps the address the provider authenticated.
    #[must_use]
    pub fn merge(user: &SessionUser, row: ProfileRow) -> Self {
        let mut attributes = user.extra.clone();
        let mut email = user.email.clone();
        let mut role = None;

        for (key, value) in row {
            match key.as_str() {
                "id" => {}
                "email" => {
                    if let Some(row_email) = value.as_str() {
                        email = Some(row_email.to_owned());
                    }
                }
                "role" => {
                    role = role_from_value(&value);
                    attributes.insert(key, value);
                }
                _ => {
                    attributes.insert(key, value);
                }
            }
        }

        Self { id: user.id, email, role, attributes, source: ProfileSource::Fetched }
    }

    /// Profile built from session fields only, recording why the lookup failed.
    #[must_use]
    pub fn degraded(user: &SessionUser, reason: impl Into<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: None,
            attributes: user.extra.clone(),
            source: ProfileSource::Degraded { reason: reason.into() },
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, ProfileSource::Degraded { .. })
    }
}

fn role_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
