use std::path::Path;

use redb::{Database, TableDefinition};

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::RedbTransaction;

fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(storage_err)?;
        Ok(Self { db })
    }
}

impl Store for RedbStore {
    type Txn<'a> = RedbTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        RedbTransaction::new(&self.db, read_only)
    }

    fn create_namespace(&self, name: &str) -> Result<(), StoreError> {
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(name);
        let txn = self.db.begin_write().map_err(storage_err)?;
        txn.open_table(def).map_err(storage_err)?;
        txn.commit().map_err(storage_err)
    }

    fn drop_namespace(&self, name: &str) -> Result<(), StoreError> {
        let def: TableDefinition<'_, &[u8], &[u8]> = TableDefinition::new(name);
        let txn = self.db.begin_write().map_err(storage_err)?;
        txn.delete_table(def).map_err(storage_err)?;
        txn.commit().map_err(storage_err)
    }
}
