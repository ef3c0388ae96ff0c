//! Ambient access to the auth store for a task tree.
//!
//! Components that cannot take the store by constructor read it with
//! [`use_auth`] inside a [`provide`] scope. Reading it anywhere else is a
//! wiring bug and fails loudly instead of handing back an empty store.

use std::future::Future;

use crate::store::AuthSessionStore;

tokio::task_local! {
    static CURRENT_AUTH: AuthSessionStore;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("use_auth must be called within an auth provider scope")]
    MissingProvider,
}

/// Run `fut` with `store` installed as the ambient auth provider.
pub async fn provide<F: Future>(store: AuthSessionStore, fut: F) -> F::Output {
    CURRENT_AUTH.scope(store, fut).await
}

/// The store installed by the nearest enclosing [`provide`].
///
/// # Errors
///
/// Returns [`ScopeError::MissingProvider`] outside any provider scope.
pub fn use_auth() -> Result<AuthSessionStore, ScopeError> {
    CURRENT_AUTH
        .try_with(AuthSessionStore::clone)
        .map_err(|_| ScopeError::MissingProvider)
}

#[cfg(test)]
#[path = "scope_test.rs"]
mod tests;
