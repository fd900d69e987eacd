//! Provider-neutral key-value storage.
//!
//! ```text
//!  Session / handlers       KvHandle (typed get<T>/put<T>, key validation)
//!                                │
//!                           Arc<dyn KvStore>  (object-safe, Bytes)
//!                                │
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!          in-memory stores              PersistentKvStore
//!          (tests)                       (redb file, CLI sessions)
//! ```
//!
//! The client session persists its bearer token and user record through a [`KvHandle`], so the
//! same code works against an in-memory store in tests and a file-backed store on a workstation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kv store error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Object-safe storage backend. Implementations handle their own locking.
#[async_trait(?Send)]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>, KvError>;

    async fn put_bytes(&self, key: &str, value: Bytes) -> Result<(), KvError>;

    /// Succeeds even if the key did not exist.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// Cloneable handle to a [`KvStore`] that stores values as JSON.
#[derive(Clone)]
pub struct KvHandle {
    store: Arc<dyn KvStore>,
}

impl fmt::Debug for KvHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvHandle").finish_non_exhaustive()
    }
}

impl KvHandle {
    pub const MAX_KEY_SIZE: usize = 512;
    pub const MAX_VALUE_SIZE: usize = 25 * 1024 * 1024;

    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn with_store<S>(store: S) -> Self
    where
        S: KvStore + 'static,
    {
        Self::new(Arc::new(store))
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        if key.len() > Self::MAX_KEY_SIZE {
            return Err(KvError::Validation(format!(
                "key length {} exceeds limit of {} bytes",
                key.len(),
                Self::MAX_KEY_SIZE
            )));
        }
        if key == "." || key == ".." {
            return Err(KvError::Validation(
                "key cannot be exactly '.' or '..'".to_string(),
            ));
        }
        if key.chars().any(char::is_control) {
            return Err(KvError::Validation(
                "key contains invalid control characters".to_string(),
            ));
        }
        Ok(())
    }

    /// `Ok(None)` for a missing key; bytes that are not `T` are a serialization error.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KvError> {
        Self::validate_key(key)?;
        match self.store.get_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), KvError> {
        Self::validate_key(key)?;
        let bytes = serde_json::to_vec(value)?;
        if bytes.len() > Self::MAX_VALUE_SIZE {
            return Err(KvError::Validation(format!(
                "value size {} exceeds limit of 25MB",
                bytes.len()
            )));
        }
        self.store.put_bytes(key, Bytes::from(bytes)).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), KvError> {
        Self::validate_key(key)?;
        self.store.delete(key).await
    }
}

/// Generate the behavioural contract every [`KvStore`] backend must satisfy.
///
/// ```rust,ignore
/// keyportal_core::kv_contract_tests!(persistent_kv_contract, {
///     let dir = tempfile::tempdir().unwrap();
///     PersistentKvStore::open(dir.path().join("session.redb")).unwrap()
/// });
/// ```
#[macro_export]
macro_rules! kv_contract_tests {
    ($mod_name:ident, $factory:expr) => {
        mod $mod_name {
            use super::*;
            use bytes::Bytes;
            use $crate::kv::KvStore;

            fn run<F: std::future::Future>(f: F) -> F::Output {
                futures::executor::block_on(f)
            }

            #[test]
            fn contract_put_and_get() {
                let store = $factory;
                run(async {
                    store.put_bytes("k", Bytes::from("v")).await.unwrap();
                    assert_eq!(store.get_bytes("k").await.unwrap(), Some(Bytes::from("v")));
                });
            }

            #[test]
            fn contract_get_missing_returns_none() {
                let store = $factory;
                run(async {
                    assert_eq!(store.get_bytes("missing").await.unwrap(), None);
                });
            }

            #[test]
            fn contract_put_overwrites() {
                let store = $factory;
                run(async {
                    store.put_bytes("k", Bytes::from("first")).await.unwrap();
                    store.put_bytes("k", Bytes::from("second")).await.unwrap();
                    assert_eq!(
                        store.get_bytes("k").await.unwrap(),
                        Some(Bytes::from("second"))
                    );
                });
            }

            #[test]
            fn contract_delete_removes_key() {
                let store = $factory;
                run(async {
                    store.put_bytes("k", Bytes::from("v")).await.unwrap();
                    store.delete("k").await.unwrap();
                    assert_eq!(store.get_bytes("k").await.unwrap(), None);
                    store.delete("never-written").await.unwrap();
                });
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStore {
        data: Mutex<HashMap<String, Bytes>>,
    }

    #[async_trait(?Send)]
    impl KvStore for MockStore {
        async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>, KvError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn put_bytes(&self, key: &str, value: Bytes) -> Result<(), KvError> {
            self.data.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), KvError> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn handle() -> (KvHandle, Arc<MockStore>) {
        let store = Arc::new(MockStore::default());
        (KvHandle::new(store.clone()), store)
    }

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct StoredUser {
        id: u32,
        email: String,
    }

    #[tokio::test]
    async fn typed_values_are_stored_as_json() {
        let (h, store) = handle();
        let user = StoredUser {
            id: 7,
            email: "ada@example.com".into(),
        };
        h.put("api_key_user_data", &user).await.unwrap();

        let raw = store.get_bytes("api_key_user_data").await.unwrap().unwrap();
        assert_eq!(raw.as_ref(), br#"{"id":7,"email":"ada@example.com"}"#);
        let out: Option<StoredUser> = h.get("api_key_user_data").await.unwrap();
        assert_eq!(out, Some(user));
    }

    #[tokio::test]
    async fn unsized_strings_can_be_stored() {
        let (h, _) = handle();
        h.put("api_key_auth_token", "tok-123").await.unwrap();
        let token: Option<String> = h.get("api_key_auth_token").await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn corrupt_json_is_a_serialization_error() {
        let (h, store) = handle();
        store.put_bytes("bad", Bytes::from("not json")).await.unwrap();
        let err = h.get::<StoredUser>("bad").await.unwrap_err();
        assert!(matches!(err, KvError::Serialization(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (h, _) = handle();
        h.put("k", &1u8).await.unwrap();
        h.delete("k").await.unwrap();
        assert_eq!(h.get::<u8>("k").await.unwrap(), None);
        h.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_the_backend() {
        let (h1, _) = handle();
        let h2 = h1.clone();
        h1.put("shared", &42i32).await.unwrap();
        assert_eq!(h2.get::<i32>("shared").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn validation_rejects_bad_keys() {
        let (h, _) = handle();
        let long_key = "a".repeat(KvHandle::MAX_KEY_SIZE + 1);
        let err = h.get::<i32>(&long_key).await.unwrap_err();
        assert!(err.to_string().contains("key length"));

        let err = h.get::<i32>("..").await.unwrap_err();
        assert!(err.to_string().contains("cannot be exactly"));

        let err = h.put("line\nbreak", &1).await.unwrap_err();
        assert!(err.to_string().contains("control characters"));
    }

    #[tokio::test]
    async fn validation_rejects_large_values() {
        let (h, _) = handle();
        let large = "x".repeat(KvHandle::MAX_VALUE_SIZE);
        let err = h.put("large", large.as_str()).await.unwrap_err();
        assert!(err.to_string().contains("value size"));
    }

    #[test]
    fn handle_debug_output() {
        assert!(format!("{:?}", handle().0).contains("KvHandle"));
    }

    crate::kv_contract_tests!(mock_store_contract, MockStore::default());
}
