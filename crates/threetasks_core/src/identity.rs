//! Anonymous per-device identity.
//!
//! # Responsibility
//! - Hand out one stable `UserId` per installation, generated on first use.
//! - Keep callers unblocked when durable storage is unavailable.
//!
//! # Invariants
//! - Once persisted, the same id is returned for the installation lifetime.
//! - A storage failure yields a session-scoped id instead of an error; data
//!   written under it is not retrievable by later sessions.

use crate::kv::{KeyValueStore, KvResult};
use crate::model::list::UserId;
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Storage key of the persisted device id.
pub const USER_ID_KEY: &str = "three_tasks_user_id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("no user identity available: {0}")]
    Unavailable(String),
}

/// Source of the user id every task query is scoped by.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn user_id(&self) -> Result<UserId, IdentityError>;
}

/// Identity persisted in a [`KeyValueStore`] under [`USER_ID_KEY`].
pub struct DeviceIdentity {
    store: Arc<dyn KeyValueStore>,
    resolved: Mutex<Option<UserId>>,
}

impl DeviceIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            resolved: Mutex::new(None),
        }
    }

    fn resolve(&self) -> UserId {
        match self.load_or_create() {
            Ok(user_id) => user_id,
            Err(err) => {
                error!(
                    "event=identity_resolve module=identity status=error error_code=identity_storage_unavailable error={}",
                    err
                );
                warn!("event=identity_fallback module=identity status=ok scope=session");
                UserId::generate()
            }
        }
    }

    fn load_or_create(&self) -> KvResult<UserId> {
        let stored = self.store.get(USER_ID_KEY)?;
        if let Some(user_id) = stored.and_then(|raw| UserId::parse(raw).ok()) {
            return Ok(user_id);
        }

        let user_id = UserId::generate();
        self.store.set(USER_ID_KEY, user_id.as_str())?;
        info!("event=identity_create module=identity status=ok");
        Ok(user_id)
    }
}

#[async_trait]
impl IdentitySource for DeviceIdentity {
    async fn user_id(&self) -> Result<UserId, IdentityError> {
        let mut resolved = self
            .resolved
            .lock()
            .map_err(|_| IdentityError::Unavailable("identity cache lock poisoned".to_string()))?;
        if let Some(user_id) = resolved.as_ref() {
            return Ok(user_id.clone());
        }
        let user_id = self.resolve();
        *resolved = Some(user_id.clone());
        Ok(user_id)
    }
}

/// Identity supplied by the embedder, or deliberately absent.
#[derive(Debug, Clone)]
pub struct FixedIdentity(Option<UserId>);

impl FixedIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self(Some(user_id))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IdentitySource for FixedIdentity {
    async fn user_id(&self) -> Result<UserId, IdentityError> {
        self.0
            .clone()
            .ok_or_else(|| IdentityError::Unavailable("no user id configured".to_string()))
    }
}
