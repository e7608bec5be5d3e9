use ejdb_store::{Store, Transaction};

use crate::error::EngineError;
use crate::kv::{CATALOG_NS, INDEX_NS, RECORDS_NS};

/// A transaction scoped to one `KvEngine`, with its three namespaces
/// (catalog, records, indexes) resolved once up front.
pub struct KvTransaction<'a, S: Store + 'a> {
    pub(crate) txn: S::Txn<'a>,
    pub(crate) catalog_ns: <S::Txn<'a> as Transaction>::Ns,
    pub(crate) records_ns: <S::Txn<'a> as Transaction>::Ns,
    pub(crate) index_ns: <S::Txn<'a> as Transaction>::Ns,
}

impl<'a, S: Store + 'a> KvTransaction<'a, S> {
    pub(crate) fn new(txn: S::Txn<'a>) -> Result<Self, EngineError> {
        let catalog_ns = txn.namespace(CATALOG_NS)?;
        let records_ns = txn.namespace(RECORDS_NS)?;
        let index_ns = txn.namespace(INDEX_NS)?;
        Ok(Self {
            txn,
            catalog_ns,
            records_ns,
            index_ns,
        })
    }

    pub fn commit(self) -> Result<(), EngineError> {
        self.txn.commit().map_err(EngineError::from)
    }

    pub fn rollback(self) -> Result<(), EngineError> {
        self.txn.rollback().map_err(EngineError::from)
    }
}
