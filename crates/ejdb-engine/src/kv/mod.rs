//! Concrete engine over `ejdb-store`: the catalog, record storage, and
//! index maintenance described in spec.md §4.4/§4.5.
//!
//! `ejdb-store::Store` already gives backend polymorphism (memory vs
//! `redb`), so this is a concrete struct rather than a second layer of
//! `Engine`/`EngineTransaction` traits — see DESIGN.md for why the
//! older two-trait shape was dropped in favor of this.

pub mod catalog;
pub mod transaction;

pub use transaction::KvTransaction;

use ejdb_store::Store;

use crate::error::EngineError;

pub(crate) const CATALOG_NS: &str = "catalog";
pub(crate) const RECORDS_NS: &str = "records";
pub(crate) const INDEX_NS: &str = "indexes";

pub struct KvEngine<S> {
    store: S,
}

impl<S: Store> KvEngine<S> {
    pub fn open(store: S) -> Result<Self, EngineError> {
        store.create_namespace(CATALOG_NS)?;
        store.create_namespace(RECORDS_NS)?;
        store.create_namespace(INDEX_NS)?;
        Ok(Self { store })
    }

    pub fn begin(&self, read_only: bool) -> Result<KvTransaction<'_, S>, EngineError> {
        let txn = self.store.begin(read_only)?;
        KvTransaction::new(txn)
    }
}
