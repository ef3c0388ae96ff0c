use super::*;
use crate::test_helpers::{MockIdentity, MockProfiles, session_for, store_with};
use uuid::Uuid;

#[test]
fn use_auth_outside_scope_is_missing_provider() {
    let err = use_auth().err().unwrap();
    assert_eq!(err, ScopeError::MissingProvider);
    assert!(err.to_string().contains("auth provider scope"));
}

#[tokio::test]
async fn use_auth_outside_scope_in_async_task() {
    let result = tokio::spawn(async { use_auth().is_err() }).await.unwrap();
    assert!(result);
}

#[tokio::test]
async fn use_auth_inside_scope_returns_same_store() {
    let id = Uuid::new_v4();
    let identity = MockIdentity::new().with_initial(session_for(id, "admin@wolvinvest.test"));
    let (store, _, _) = store_with(identity, MockProfiles::new());
    let _guard = store.mount();
    store.settled().await;

    let seen = provide(store.clone(), async {
        let auth = use_auth().unwrap();
        auth.current_session().map(|s| s.user.id)
    })
    .await;
    assert_eq!(seen, Some(id));
}

#[tokio::test]
async fn scope_ends_with_future() {
    let (store, _, _) = store_with(MockIdentity::new(), MockProfiles::new());
    provide(store, async { assert!(use_auth().is_ok()) }).await;
    assert_eq!(use_auth().err(), Some(ScopeError::MissingProvider));
}
