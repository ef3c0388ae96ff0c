//! Hand-written collaborators for store tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Notify, broadcast, watch};
use uuid::Uuid;

use crate::provider::{AuthSubscription, IdentityProvider, ProfileError, ProfileStore, ProviderError};
use crate::session::{AuthChangeEvent, AuthEvent, AuthOutcome, Credentials, ProfileRow, Session, SessionUser};
use crate::store::AuthSessionStore;

/// Build a session for `id` with a recognizable access token.
#[must_use]
pub fn session_for(id: Uuid, email: &str) -> Session {
    Session {
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        token_type: "bearer".into(),
        expires_in: 3600,
        expires_at: None,
        user: SessionUser {
            id,
            email: Some(email.to_owned()),
            extra: json!({ "aud": "authenticated" }).as_object().cloned().unwrap_or_default(),
        },
    }
}

#[must_use]
pub fn role_row(id: Uuid, role: &str) -> ProfileRow {
    json!({ "id": id, "role": role }).as_object().cloned().unwrap_or_default()
}

// =============================================================================
// MockIdentity
// =============================================================================

/// Scripted identity provider. Successful sign-ins push `SIGNED_IN`, like the
/// hosted client does.
pub struct MockIdentity {
    events: broadcast::Sender<AuthEvent>,
    initial: Mutex<Result<Option<Session>, ProviderError>>,
    initial_gate: Mutex<Option<Arc<Notify>>>,
    sign_in_results: Mutex<VecDeque<Result<AuthOutcome, ProviderError>>>,
    sign_up_results: Mutex<VecDeque<Result<AuthOutcome, ProviderError>>>,
    sign_out_result: Mutex<Result<(), ProviderError>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockIdentity {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            initial: Mutex::new(Ok(None)),
            initial_gate: Mutex::new(None),
            sign_in_results: Mutex::new(VecDeque::new()),
            sign_up_results: Mutex::new(VecDeque::new()),
            sign_out_result: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_initial(self, session: Session) -> Self {
        *self.initial.lock().unwrap() = Ok(Some(session));
        self
    }

    /// Replace what `get_session` resolves to from now on.
    pub fn set_initial(&self, session: Option<Session>) {
        *self.initial.lock().unwrap() = Ok(session);
    }

    pub fn fail_initial(&self, error: ProviderError) {
        *self.initial.lock().unwrap() = Err(error);
    }

    /// Hold `get_session` until the returned gate is notified.
    pub fn gate_initial(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.initial_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn script_sign_in(&self, result: Result<AuthOutcome, ProviderError>) {
        self.sign_in_results.lock().unwrap().push_back(result);
    }

    pub fn script_sign_up(&self, result: Result<AuthOutcome, ProviderError>) {
        self.sign_up_results.lock().unwrap().push_back(result);
    }

    pub fn fail_sign_out(&self, error: ProviderError) {
        *self.sign_out_result.lock().unwrap() = Err(error);
    }

    /// Push an auth-state change to every subscriber.
    pub fn push(&self, event: AuthChangeEvent, session: Option<Session>) {
        let _ = self.events.send(AuthEvent { event, session });
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_owned());
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.record("get_session");
        let gate = self.initial_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.initial.lock().unwrap().clone()
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError> {
        self.record(&format!("sign_in:{}", credentials.email));
        let result = self
            .sign_in_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AuthOutcome::default()));
        if let Ok(AuthOutcome { session: Some(session), .. }) = &result {
            self.push(AuthChangeEvent::SignedIn, Some(session.clone()));
        }
        result
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthOutcome, ProviderError> {
        self.record(&format!("sign_up:{}", credentials.email));
        let result = self
            .sign_up_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AuthOutcome::default()));
        if let Ok(AuthOutcome { session: Some(session), .. }) = &result {
            self.push(AuthChangeEvent::SignedIn, Some(session.clone()));
        }
        result
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.record("sign_out");
        let result = self.sign_out_result.lock().unwrap().clone();
        if result.is_ok() {
            self.push(AuthChangeEvent::SignedOut, None);
        }
        result
    }
}

// =============================================================================
// MockProfiles
// =============================================================================

/// Users-table stand-in. Lookups for a gated user block until released.
pub struct MockProfiles {
    rows: Mutex<HashMap<Uuid, Result<ProfileRow, ProfileError>>>,
    gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    completed: watch::Sender<usize>,
}

impl MockProfiles {
    #[must_use]
    pub fn new() -> Self {
        let (completed, _) = watch::channel(0);
        Self { rows: Mutex::new(HashMap::new()), gates: Mutex::new(HashMap::new()), completed }
    }

    pub fn insert(&self, id: Uuid, row: Result<ProfileRow, ProfileError>) {
        self.rows.lock().unwrap().insert(id, row);
    }

    /// Block lookups for `id` until the returned gate is notified.
    pub fn gate(&self, id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(id, Arc::clone(&gate));
        gate
    }

    /// Wait until `n` lookups have returned in total.
    pub async fn wait_completed(&self, n: usize) {
        let mut rx = self.completed.subscribe();
        let _ = rx.wait_for(|done| *done >= n).await;
    }
}

#[async_trait]
impl ProfileStore for MockProfiles {
    async fn fetch_profile(&self, session: &Session) -> Result<ProfileRow, ProfileError> {
        let id = session.user.id;
        let gate = self.gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let result = self.rows.lock().unwrap().get(&id).cloned().unwrap_or(Err(ProfileError::NotFound));
        self.completed.send_modify(|done| *done += 1);
        result
    }
}

/// Store wired to fresh mocks, returned alongside them.
#[must_use]
pub fn store_with(identity: MockIdentity, profiles: MockProfiles) -> (AuthSessionStore, Arc<MockIdentity>, Arc<MockProfiles>) {
    let identity = Arc::new(identity);
    let profiles = Arc::new(profiles);
    let store = AuthSessionStore::new(identity.clone(), profiles.clone());
    (store, identity, profiles)
}
