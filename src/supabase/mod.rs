//! Hosted backend clients: auth API, users-table lookup, and their config.
//!
//! [`SupabaseClient`] wires both halves onto one HTTP connection pool and
//! hands them to an [`AuthSessionStore`].

pub mod auth;
pub mod config;
pub mod rest;
pub mod storage;

use std::sync::Arc;

pub use auth::GoTrueClient;
pub use config::{ConfigError, HttpTimeouts, SupabaseConfig};
pub use rest::PostgrestProfiles;
pub use storage::SessionFile;

use crate::provider::ProviderError;
use crate::store::AuthSessionStore;

/// Auth client and profile lookup sharing one HTTP client.
#[derive(Clone)]
pub struct SupabaseClient {
    pub auth: Arc<GoTrueClient>,
    pub profiles: Arc<PostgrestProfiles>,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: &SupabaseConfig) -> Result<Self, ProviderError> {
        let http = auth::build_http(config.timeouts)?;
        Ok(Self {
            auth: Arc::new(GoTrueClient::with_http(http.clone(), config)),
            profiles: Arc::new(PostgrestProfiles::with_http(http, config)),
        })
    }

    /// A store backed by this client. Call [`AuthSessionStore::mount`] to start it.
    #[must_use]
    pub fn into_store(self) -> AuthSessionStore {
        AuthSessionStore::new(self.auth, self.profiles)
    }
}
