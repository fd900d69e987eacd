//! In-memory [`KvStore`] for unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use keyportal_core::kv::{KvError, KvHandle, KvStore};

#[derive(Default)]
pub(crate) struct MemoryKvStore {
    data: Mutex<BTreeMap<String, Bytes>>,
}

impl MemoryKvStore {
    /// A handle for the code under test plus the store itself for assertions.
    pub(crate) fn shared() -> (KvHandle, Arc<MemoryKvStore>) {
        let store = Arc::new(MemoryKvStore::default());
        (KvHandle::new(store.clone()), store)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.data.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait(?Send)]
impl KvStore for MemoryKvStore {
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

keyportal_core::kv_contract_tests!(memory_kv_contract, MemoryKvStore::default());
