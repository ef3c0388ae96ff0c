//! Authentication session state for the Wolvinvest admin dashboard.
//!
//! [`AuthSessionStore`] caches the current session and the signed-in user's
//! profile (including the admin `role` from the users table), exposes
//! sign-in, sign-up and sign-out, and keeps itself current from the identity
//! provider's push subscription. [`scope::provide`] and [`scope::use_auth`]
//! make one store available to a task tree.

pub mod provider;
pub mod scope;
pub mod session;
pub mod store;
pub mod supabase;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use provider::{
    AuthSubscription, IdentityProvider, ProfileError, ProfileStore, ProviderError, SubscriptionRecv,
};
pub use scope::{ScopeError, provide, use_auth};
pub use session::{AuthChangeEvent, AuthEvent, AuthOutcome, Credentials, ProfileSource, Session, SessionUser, UserProfile};
pub use store::{AuthPhase, AuthSessionStore, AuthSnapshot, MountGuard};
pub use supabase::{SupabaseClient, SupabaseConfig};
