use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type Namespace = OrdMap<Vec<u8>, Vec<u8>>;

/// In-memory `Store` backed by persistent (structural-sharing) ordered
/// maps. Commit is a single `ArcSwap::store` per dirty namespace, so a
/// transaction that fails partway through never mutates visible state.
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, Arc<ArcSwap<Namespace>>>>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn acquire_write_lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }

    pub(crate) fn snapshot(&self, name: &str) -> Option<Arc<Namespace>> {
        let namespaces = self.namespaces.read().unwrap();
        Some(namespaces.get(name)?.load_full())
    }

    pub(crate) fn commit(&self, dirty: HashMap<String, Arc<Namespace>>) {
        let namespaces = self.namespaces.read().unwrap();
        for (name, data) in dirty {
            if let Some(slot) = namespaces.get(&name) {
                slot.store(data);
            }
        }
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            Ok(MemoryTransaction::new_read_only(self))
        } else {
            let guard = self.acquire_write_lock()?;
            Ok(MemoryTransaction::new_writable(self, guard))
        }
    }

    fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().unwrap();
        namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_namespace(&self, name: &str) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write().unwrap();
        namespaces.remove(name);
        Ok(())
    }
}
