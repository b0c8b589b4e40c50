use std::sync::Arc;
use threetasks_core::identity::USER_ID_KEY;
use threetasks_core::kv::{KeyValueStore, KvError, KvResult, MemoryKeyValueStore};
use threetasks_core::{DeviceIdentity, FixedIdentity, IdentitySource, UserId};

struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> KvResult<Option<String>> {
        Err(KvError::Unavailable("storage disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> KvResult<()> {
        Err(KvError::Unavailable("storage disabled".to_string()))
    }
}

#[tokio::test]
async fn first_use_generates_and_persists_an_id() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let identity = DeviceIdentity::new(kv.clone());

    let user_id = identity.user_id().await.unwrap();
    assert_eq!(kv.get(USER_ID_KEY).unwrap().as_deref(), Some(user_id.as_str()));
    assert_eq!(identity.user_id().await.unwrap(), user_id);

    let next_session = DeviceIdentity::new(kv);
    assert_eq!(next_session.user_id().await.unwrap(), user_id);
}

#[tokio::test]
async fn stored_id_is_reused() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.set(USER_ID_KEY, "existing-device").unwrap();

    let identity = DeviceIdentity::new(kv);
    assert_eq!(identity.user_id().await.unwrap().as_str(), "existing-device");
}

#[tokio::test]
async fn blank_stored_id_is_replaced() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.set(USER_ID_KEY, "   ").unwrap();

    let user_id = DeviceIdentity::new(kv.clone()).user_id().await.unwrap();
    assert!(!user_id.as_str().trim().is_empty());
    assert_eq!(kv.get(USER_ID_KEY).unwrap().as_deref(), Some(user_id.as_str()));
}

#[tokio::test]
async fn unavailable_storage_falls_back_to_a_stable_session_id() {
    let identity = DeviceIdentity::new(Arc::new(UnavailableStore));

    let first = identity.user_id().await.unwrap();
    let second = identity.user_id().await.unwrap();
    assert_eq!(first, second);

    let other_session = DeviceIdentity::new(Arc::new(UnavailableStore));
    assert_ne!(other_session.user_id().await.unwrap(), first);
}

#[tokio::test]
async fn fixed_identity_reports_missing_user() {
    let user = UserId::parse("embedder-user").unwrap();
    assert_eq!(FixedIdentity::new(user.clone()).user_id().await.unwrap(), user);
    assert!(FixedIdentity::missing().user_id().await.is_err());
}
