use std::ops::Bound;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::store::Transaction;

fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

enum Inner {
    Read(redb::ReadTransaction),
    Write(redb::WriteTransaction),
    Consumed,
}

/// Read/write transaction over [`RedbStore`].
///
/// Namespaces are plain table names re-opened on every call — `redb`
/// tables are cheap handles, so there is no benefit to caching them
/// across operations the way `MemoryTransaction` caches its snapshots.
pub struct RedbTransaction<'db> {
    inner: Inner,
    #[allow(dead_code)]
    db: &'db Database,
    read_only: bool,
}

impl<'db> RedbTransaction<'db> {
    pub(crate) fn new(db: &'db Database, read_only: bool) -> Result<Self, StoreError> {
        let inner = if read_only {
            Inner::Read(db.begin_read().map_err(storage_err)?)
        } else {
            Inner::Write(db.begin_write().map_err(storage_err)?)
        };
        Ok(Self {
            inner,
            db,
            read_only,
        })
    }

    fn scan(
        &self,
        name: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(name);
        let mut out = match &self.inner {
            Inner::Read(txn) => {
                let table = txn.open_table(def).map_err(storage_err)?;
                collect_range(&table, start, end)?
            }
            Inner::Write(txn) => {
                let table = txn.open_table(def).map_err(storage_err)?;
                collect_range(&table, start, end)?
            }
            Inner::Consumed => return Err(StoreError::TransactionConsumed),
        };
        if reverse {
            out.reverse();
        }
        Ok(out)
    }
}

fn collect_range<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
    start: Bound<&[u8]>,
    end: Bound<&[u8]>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let range = table.range::<&[u8]>((start, end)).map_err(storage_err)?;
    range
        .map(|entry| {
            let (k, v) = entry.map_err(storage_err)?;
            Ok((k.value().to_vec(), v.value().to_vec()))
        })
        .collect()
}

impl<'db> Transaction for RedbTransaction<'db> {
    type Ns = String;
    type Iter<'b>
        = std::vec::IntoIter<Result<(Vec<u8>, Vec<u8>), StoreError>>
    where
        Self: 'b;

    fn namespace(&self, name: &str) -> Result<Self::Ns, StoreError> {
        Ok(name.to_string())
    }

    fn get(&self, ns: &Self::Ns, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(ns.as_str());
        match &self.inner {
            Inner::Read(txn) => {
                let table = txn.open_table(def).map_err(storage_err)?;
                Ok(table
                    .get(key)
                    .map_err(storage_err)?
                    .map(|v| v.value().to_vec()))
            }
            Inner::Write(txn) => {
                let table = txn.open_table(def).map_err(storage_err)?;
                Ok(table
                    .get(key)
                    .map_err(storage_err)?
                    .map(|v| v.value().to_vec()))
            }
            Inner::Consumed => Err(StoreError::TransactionConsumed),
        }
    }

    fn put(&mut self, ns: &Self::Ns, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(ns.as_str());
        match &self.inner {
            Inner::Write(txn) => {
                let mut table = txn.open_table(def).map_err(storage_err)?;
                table.insert(key, value).map_err(storage_err)?;
                Ok(())
            }
            Inner::Consumed => Err(StoreError::TransactionConsumed),
            Inner::Read(_) => unreachable!(),
        }
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
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(ns.as_str());
        match &self.inner {
            Inner::Write(txn) => {
                let mut table = txn.open_table(def).map_err(storage_err)?;
                if table.get(key).map_err(storage_err)?.is_some() {
                    return Ok(false);
                }
                table.insert(key, value).map_err(storage_err)?;
                Ok(true)
            }
            Inner::Consumed => Err(StoreError::TransactionConsumed),
            Inner::Read(_) => unreachable!(),
        }
    }

    fn delete(&mut self, ns: &Self::Ns, key: &[u8]) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(ns.as_str());
        match &self.inner {
            Inner::Write(txn) => {
                let mut table = txn.open_table(def).map_err(storage_err)?;
                table.remove(key).map_err(storage_err)?;
                Ok(())
            }
            Inner::Consumed => Err(StoreError::TransactionConsumed),
            Inner::Read(_) => unreachable!(),
        }
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
        let keys: Vec<Vec<u8>> = self
            .scan(ns, start, end, false)?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(ns.as_str());
        match &self.inner {
            Inner::Write(txn) => {
                let mut table = txn.open_table(def).map_err(storage_err)?;
                for key in &keys {
                    table.remove(key.as_slice()).map_err(storage_err)?;
                }
                Ok(())
            }
            Inner::Consumed => Err(StoreError::TransactionConsumed),
            Inner::Read(_) => unreachable!(),
        }
    }

    fn scan_prefix<'b>(
        &'b self,
        ns: &Self::Ns,
        prefix: &[u8],
    ) -> Result<Self::Iter<'b>, StoreError> {
        let end = crate::next_prefix(prefix);
        let upper: Bound<Vec<u8>> = match end {
            Some(e) => Bound::Excluded(e),
            None => Bound::Unbounded,
        };
        let upper_ref = match &upper {
            Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(v) => Bound::Included(v.as_slice()),
        };
        let items = self.scan(ns, Bound::Included(prefix), upper_ref, false)?;
        Ok(items.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }

    fn scan_range<'b>(
        &'b self,
        ns: &Self::Ns,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Self::Iter<'b>, StoreError> {
        let items = self.scan(ns, start, end, reverse)?;
        Ok(items.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let inner = std::mem::replace(&mut self.inner, Inner::Consumed);
        match inner {
            Inner::Write(txn) => txn.commit().map_err(storage_err),
            Inner::Read(_) => Ok(()),
            Inner::Consumed => Err(StoreError::TransactionConsumed),
        }
    }

    fn rollback(mut self) -> Result<(), StoreError> {
        let inner = std::mem::replace(&mut self.inner, Inner::Consumed);
        match inner {
            Inner::Write(txn) => txn.abort().map_err(storage_err),
            Inner::Read(_) => Ok(()),
            Inner::Consumed => Err(StoreError::TransactionConsumed),
        }
    }
}
