use std::collections::{HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, MutexGuard};

use crate::error::StoreError;
use crate::store::Transaction;

use super::store::{MemoryStore, Namespace};

#[derive(Clone)]
pub struct MemoryNs {
    name: String,
}

/// Read/write transaction over [`MemoryStore`].
///
/// Namespaces touched by the transaction are snapshotted lazily on
/// first access; writes accumulate in a local copy and are only
/// published to the store on `commit`, so readers never observe
/// partial writes and `rollback` is simply "don't publish".
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    read_only: bool,
    _write_guard: Option<MutexGuard<'a, ()>>,
    snapshot: HashMap<String, Arc<Namespace>>,
    dirty: HashSet<String>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new_read_only(store: &'a MemoryStore) -> Self {
        Self {
            store,
            read_only: true,
            _write_guard: None,
            snapshot: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    pub(crate) fn new_writable(store: &'a MemoryStore, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            store,
            read_only: false,
            _write_guard: Some(guard),
            snapshot: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    fn ensure_loaded(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.snapshot.contains_key(name) {
            let data = self
                .store
                .snapshot(name)
                .ok_or_else(|| StoreError::NamespaceNotFound(name.to_string()))?;
            self.snapshot.insert(name.to_string(), data);
        }
        Ok(())
    }

    fn get_ns(&self, name: &str) -> Result<&Arc<Namespace>, StoreError> {
        self.snapshot
            .get(name)
            .ok_or_else(|| StoreError::NamespaceNotFound(name.to_string()))
    }

    fn get_ns_mut(&mut self, name: &str) -> Result<&mut Namespace, StoreError> {
        self.ensure_loaded(name)?;
        self.dirty.insert(name.to_string());
        let arc = self.snapshot.get_mut(name).unwrap();
        Ok(Arc::make_mut(arc))
    }
}

fn bound_to_owned(b: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match b {
        Bound::Included(v) => Bound::Included(v.to_vec()),
        Bound::Excluded(v) => Bound::Excluded(v.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl<'a> Transaction for MemoryTransaction<'a> {
    type Ns = MemoryNs;
    type Iter<'b>
        = std::vec::IntoIter<Result<(Vec<u8>, Vec<u8>), StoreError>>
    where
        Self: 'b;

    fn namespace(&self, name: &str) -> Result<Self::Ns, StoreError> {
        // Existence is validated lazily on first real access so that a
        // transaction can resolve a namespace before any mutation that
        // creates it runs within the same scope.
        Ok(MemoryNs {
            name: name.to_string(),
        })
    }

    fn get(&self, ns: &Self::Ns, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let map = match self.snapshot.get(&ns.name) {
            Some(m) => m,
            None => match self.store.snapshot(&ns.name) {
                Some(m) => {
                    // Read-only path: never mutates self, so cache via interior access is skipped.
                    return Ok(m.get(key).cloned());
                }
                None => return Err(StoreError::NamespaceNotFound(ns.name.clone())),
            },
        };
        Ok(map.get(key).cloned())
    }

    fn put(&mut self, ns: &Self::Ns, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let map = self.get_ns_mut(&ns.name)?;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn put_if_absent(
        &mut self,
        ns: &Self::Ns,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let map = self.get_ns_mut(&ns.name)?;
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn delete(&mut self, ns: &Self::Ns, key: &[u8]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let map = self.get_ns_mut(&ns.name)?;
        map.remove(key);
        Ok(())
    }

    fn delete_range(
        &mut self,
        ns: &Self::Ns,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let bounds = (bound_to_owned(start), bound_to_owned(end));
        let map = self.get_ns_mut(&ns.name)?;
        let keys: Vec<Vec<u8>> = map
            .range((bounds.0.clone(), bounds.1.clone()))
            .map(|(k, _)| k.clone())
            .collect();
        for k in keys {
            map.remove(&k);
        }
        Ok(())
    }

    fn scan_prefix<'b>(&'b self, ns: &Self::Ns, prefix: &[u8]) -> Result<Self::Iter<'b>, StoreError> {
        let end = crate::next_prefix(prefix);
        let lower = Bound::Included(prefix);
        let upper = match &end {
            Some(e) => Bound::Excluded(e.as_slice()),
            None => Bound::Unbounded,
        };
        self.scan_range(ns, lower, upper, false)
    }

    fn scan_range<'b>(
        &'b self,
        ns: &Self::Ns,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Self::Iter<'b>, StoreError> {
        let owned_map;
        let map: &Namespace = match self.snapshot.get(&ns.name) {
            Some(m) => m,
            None => {
                owned_map = self
                    .store
                    .snapshot(&ns.name)
                    .ok_or_else(|| StoreError::NamespaceNotFound(ns.name.clone()))?;
                &owned_map
            }
        };
        let bounds = (bound_to_owned(start), bound_to_owned(end));
        let mut items: Vec<Result<(Vec<u8>, Vec<u8>), StoreError>> = map
            .range(bounds)
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        if reverse {
            items.reverse();
        }
        Ok(items.into_iter())
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.read_only {
            return Ok(());
        }
        let MemoryTransaction {
            store,
            dirty,
            mut snapshot,
            ..
        } = self;
        let dirty_maps: HashMap<String, Arc<Namespace>> = dirty
            .into_iter()
            .filter_map(|name| snapshot.remove(&name).map(|m| (name, m)))
            .collect();
        store.commit(dirty_maps);
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
