//! File-backed [`KvStore`] for sessions that outlive the process.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use keyportal_core::kv::{KvError, KvStore};
use redb::{Database, ReadableTable, TableDefinition};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("keyportal_kv");

/// `KvStore` persisted in a single redb file.
pub struct PersistentKvStore {
    db: Database,
}

impl PersistentKvStore {
    /// Open `path`, creating the file and its parent directory when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| KvError::Internal(err.into()))?;
        }
        let db = Database::create(path).map_err(internal)?;

        let txn = db.begin_write().map_err(internal)?;
        txn.open_table(TABLE).map_err(internal)?;
        txn.commit().map_err(internal)?;

        log::debug!("opened session store at {}", path.display());
        Ok(Self { db })
    }
}

fn internal<E>(err: E) -> KvError
where
    E: Into<redb::Error>,
{
    KvError::Internal(anyhow::Error::new(err.into()))
}

#[async_trait(?Send)]
impl KvStore for PersistentKvStore {
    async fn get_bytes(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let txn = self.db.begin_read().map_err(internal)?;
        let table = txn.open_table(TABLE).map_err(internal)?;
        let value = table.get(key).map_err(internal)?;
        Ok(value.map(|guard| Bytes::copy_from_slice(guard.value())))
    }

    async fn put_bytes(&self, key: &str, value: Bytes) -> Result<(), KvError> {
        let txn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = txn.open_table(TABLE).map_err(internal)?;
            table.insert(key, value.as_ref()).map_err(internal)?;
        }
        txn.commit().map_err(internal)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let txn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = txn.open_table(TABLE).map_err(internal)?;
            table.remove(key).map_err(internal)?;
        }
        txn.commit().map_err(internal)
    }
}
