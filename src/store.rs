//! Auth session store: the single source of truth for who is signed in.
//!
//! SYSTEM CONTEXT
//! ==============
//! Consumers read the cached session/profile, subscribe to snapshot changes,
//! and call `sign_in`/`sign_up`/`sign_out`. The store never trusts the return
//! value of a sign-in call for state: the identity provider pushes the new
//! session through its subscription and the store applies it from there.
//!
//! DESIGN
//! ======
//! State lives in a `watch` channel holding an immutable `AuthSnapshot`.
//! Every applied session (and every sign-out) bumps `generation`; profile
//! fetches and the initial session load remember the generation they were
//! issued under and are dropped if it moved on. That makes the newest issued
//! session win even when an older profile lookup resolves later.
//!
//! TRADE-OFFS
//! ==========
//! A failed profile lookup degrades to a session-only profile instead of
//! surfacing an error. The failure is kept in `UserProfile::source` and logged,
//! so callers that care can tell the two apart.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::provider::{AuthSubscription, IdentityProvider, ProfileStore, ProviderError, SubscriptionRecv};
use crate::session::{AuthOutcome, Credentials, Session, UserProfile};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Coarse authentication state derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No session.
    Unauthenticated,
    /// Session known, profile for that user not yet fetched.
    Authenticating,
    /// Session and matching profile both present.
    Authenticated,
}

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    pub session: Option<Arc<Session>>,
    pub user: Option<Arc<UserProfile>>,
    /// True until the provider has resolved the persisted session at startup.
    pub loading: bool,
    /// Bumped on every session change; used to discard stale async results.
    pub generation: u64,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self { loading: true, ..Self::default() }
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        match (&self.session, &self.user) {
            (None, _) => AuthPhase::Unauthenticated,
            (Some(session), Some(user)) if user.id == session.user.id => AuthPhase::Authenticated,
            (Some(_), _) => AuthPhase::Authenticating,
        }
    }

    /// Startup finished and no profile is outstanding for the current session.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading && self.phase() != AuthPhase::Authenticating
    }
}

/// A profile lookup tagged with the generation it was issued under.
struct FetchJob {
    generation: u64,
    session: Arc<Session>,
}

/// Overwrite the snapshot's session. Returns the profile lookup to issue, if any.
fn apply_session(snapshot: &mut AuthSnapshot, session: Option<Arc<Session>>) -> Option<FetchJob> {
    snapshot.generation += 1;

    let same_user = matches!(
        (&snapshot.user, &session),
        (Some(user), Some(next)) if user.id == next.user.id
    );
    if !same_user {
        snapshot.user = None;
    }
    snapshot.session = session.clone();

    session.map(|session| FetchJob { generation: snapshot.generation, session })
}

// =============================================================================
// STORE
// =============================================================================

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    state: watch::Sender<AuthSnapshot>,
}

/// Cheaply cloneable handle to one auth session store.
#[derive(Clone)]
pub struct AuthSessionStore {
    inner: Arc<Inner>,
}

impl AuthSessionStore {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        Self { inner: Arc::new(Inner { identity, profiles, state }) }
    }

    /// Subscribe to provider events and resolve the persisted session.
    ///
    /// Must be called from within a tokio runtime. The subscription lives until
    /// the returned guard is dropped or unmounted.
    pub fn mount(&self) -> MountGuard {
        let issued = self.inner.state.borrow().generation;
        let subscription = self.inner.identity.subscribe();
        let listener = tokio::spawn(listen(Arc::clone(&self.inner), subscription));
        let initial = tokio::spawn(load_initial(Arc::clone(&self.inner), issued));
        MountGuard { inner: Some(Arc::clone(&self.inner)), tasks: vec![listener, initial] }
    }

    // -------------------------------------------------------------------------
    // reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.inner.state.borrow().session.clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<Arc<UserProfile>> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        self.inner.state.borrow().phase()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// Wait until a snapshot satisfies `predicate` and return it.
    pub async fn wait_for(&self, predicate: impl FnMut(&AuthSnapshot) -> bool) -> AuthSnapshot {
        let mut rx = self.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        rx.wait_for(predicate)
            .await
            .map_or_else(|_| self.snapshot(), |snapshot| snapshot.clone())
    }

    /// Wait for startup to finish and any pending profile to land.
    pub async fn settled(&self) -> AuthSnapshot {
        self.wait_for(AuthSnapshot::is_settled).await
    }

    // -------------------------------------------------------------------------
    // actions
    // -------------------------------------------------------------------------

    /// Password sign-in. The resulting session arrives via the provider push.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged (bad credentials, unverified
    /// account, transport failure). Local state is not touched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome, ProviderError> {
        let credentials = Credentials::new(email, password);
        let result = self.inner.identity.sign_in_with_password(&credentials).await;
        match &result {
            Ok(_) => info!(email, "sign-in accepted"),
            Err(e) => info!(email, error = %e, "sign-in rejected"),
        }
        result
    }

    /// Account creation. May leave the session empty until the email is verified.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthOutcome, ProviderError> {
        let credentials = Credentials::new(email, password);
        let result = self.inner.identity.sign_up(&credentials).await;
        match &result {
            Ok(outcome) => info!(email, needs_verification = outcome.session.is_none(), "sign-up accepted"),
            Err(e) => info!(email, error = %e, "sign-up rejected"),
        }
        result
    }

    /// Sign out with the provider, then clear local state.
    ///
    /// Local state is cleared even if the provider call fails; on return both
    /// reads yield `None` and any in-flight profile lookup is void.
    pub async fn sign_out(&self) {
        if let Err(e) = self.inner.identity.sign_out().await {
            warn!(error = %e, "provider sign-out failed; clearing local session anyway");
        }
        self.inner.state.send_modify(|snapshot| {
            apply_session(snapshot, None);
        });
        info!("signed out");
    }
}

// =============================================================================
// BACKGROUND WORK
// =============================================================================

/// Owns the tasks started by [`AuthSessionStore::mount`].
///
/// Dropping the guard aborts them, which releases the provider subscription,
/// and voids any profile lookup still in flight so it never lands.
#[must_use = "dropping the guard unmounts the store"]
pub struct MountGuard {
    inner: Option<Arc<Inner>>,
    tasks: Vec<JoinHandle<()>>,
}

impl MountGuard {
    /// Abort the store's tasks, wait until they are gone, then void pending lookups.
    pub async fn unmount(mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        self.void_pending();
    }

    /// Bump the generation so detached profile fetches are discarded.
    fn void_pending(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.state.send_modify(|snapshot| snapshot.generation += 1);
            debug!("store unmounted");
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.void_pending();
    }
}

fn apply_pushed(inner: &Arc<Inner>, session: Option<Session>) {
    let mut job = None;
    inner.state.send_modify(|snapshot| {
        job = apply_session(snapshot, session.map(Arc::new));
    });
    if let Some(job) = job {
        spawn_profile_fetch(inner, job);
    }
}

async fn listen(inner: Arc<Inner>, mut subscription: AuthSubscription) {
    loop {
        match subscription.recv().await {
            SubscriptionRecv::Event(event) => {
                debug!(event = event.event.as_str(), has_session = event.session.is_some(), "auth state change");
                apply_pushed(&inner, event.session);
            }
            SubscriptionRecv::Lagged { skipped } => {
                warn!(skipped, "auth subscription lagged; re-reading session");
                match inner.identity.get_session().await {
                    Ok(session) => apply_pushed(&inner, session),
                    Err(e) => warn!(error = %e, "session re-read failed"),
                }
            }
            SubscriptionRecv::Closed => {
                debug!("auth subscription closed");
                break;
            }
        }
    }
}

/// Resolve the persisted session unless a push or sign-out landed after `issued`.
async fn load_initial(inner: Arc<Inner>, issued: u64) {
    let session = match inner.identity.get_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "initial session load failed");
            None
        }
    };

    let mut job = None;
    inner.state.send_modify(|snapshot| {
        snapshot.loading = false;
        if snapshot.generation == issued {
            job = apply_session(snapshot, session.map(Arc::new));
        } else {
            debug!(issued, current = snapshot.generation, "initial session superseded by provider push");
        }
    });
    if let Some(job) = job {
        spawn_profile_fetch(&inner, job);
    }
}

fn spawn_profile_fetch(inner: &Arc<Inner>, job: FetchJob) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let user = &job.session.user;
        let profile = match inner.profiles.fetch_profile(&job.session).await {
            Ok(row) => UserProfile::merge(user, row),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "profile fetch failed; using session fields only");
                UserProfile::degraded(user, e.to_string())
            }
        };

        let applied = inner.state.send_if_modified(|snapshot| {
            if snapshot.generation != job.generation {
                return false;
            }
            snapshot.user = Some(Arc::new(profile));
            true
        });
        if !applied {
            debug!(user_id = %user.id, generation = job.generation, "discarding stale profile");
        }
    });
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
