//! Collaborator seams: the hosted identity provider and the users-table lookup.
//!
//! ARCHITECTURE
//! ============
//! The store only talks to these traits. `supabase::GoTrueClient` and
//! `supabase::PostgrestProfiles` are the production implementations; tests
//! plug in hand-written mocks.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::session::{AuthEvent, AuthOutcome, Credentials, ProfileRow, Session};

// =============================================================================
// ERRORS
// =============================================================================

/// Errors reported by the identity provider client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the request. Displays the provider's message verbatim.
    #[error("{message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// The HTTP request could not be sent or the body could not be read.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The provider response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The persisted session could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

/// Errors from the users-table lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("profile row not found")]
    NotFound,

    #[error("profile request failed: {0}")]
    Request(String),

    #[error("profile lookup rejected: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("profile response parse failed: {0}")]
    Parse(String),
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Result of receiving from an [`AuthSubscription`].
#[derive(Debug)]
pub enum SubscriptionRecv {
    Event(AuthEvent),
    /// The subscriber fell behind and `skipped` events were dropped.
    Lagged { skipped: u64 },
    /// The provider went away; no further events will arrive.
    Closed,
}

/// Live subscription to provider auth-state changes.
///
/// Dropping the handle (or calling [`AuthSubscription::unsubscribe`]) stops
/// delivery.
#[derive(Debug)]
pub struct AuthSubscription {
    events: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    #[must_use]
    pub fn new(events: broadcast::Receiver<AuthEvent>) -> Self {
        Self { events }
    }

    pub async fn recv(&mut self) -> SubscriptionRecv {
        match self.events.recv().await {
            Ok(event) => SubscriptionRecv::Event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => SubscriptionRecv::Lagged { skipped },
            Err(broadcast::error::RecvError::Closed) => SubscriptionRecv::Closed,
        }
    }

    pub fn unsubscribe(self) {
        drop(self.events);
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Hosted identity provider client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current (possibly persisted) session.
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Subscribe to auth-state changes for as long as the handle lives.
    fn subscribe(&self) -> AuthSubscription;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Point lookup of a user's row, projected to the configured columns.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, session: &Session) -> Result<ProfileRow, ProfileError>;
}
