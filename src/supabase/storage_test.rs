use super::*;
use crate::test_helpers::session_for;
use tempfile::TempDir;
use uuid::Uuid;

#[tokio::test]
async fn load_missing_file_is_none() {
    let dir = TempDir::new().unwrap();
    let file = SessionFile::new(dir.path().join("session.json"));
    assert!(file.load().await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let file = SessionFile::new(dir.path().join("nested/state/session.json"));
    let mut session = session_for(Uuid::new_v4(), "admin@wolvinvest.test");
    session.expires_at = Some(1_900_000_000);

    file.save(&session).await.unwrap();
    assert!(file.path().exists());

    let loaded = file.load().await.unwrap().unwrap();
    assert_eq!(loaded, session);
}

#[tokio::test]
async fn corrupt_file_is_storage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = SessionFile::new(&path).load().await.unwrap_err();
    assert!(matches!(err, ProviderError::Storage(ref msg) if msg.contains("session.json")));
}

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&session_for(Uuid::new_v4(), "a@b.com")).await.unwrap();

    file.remove().await.unwrap();
    assert!(!file.path().exists());
    file.remove().await.unwrap();
}
