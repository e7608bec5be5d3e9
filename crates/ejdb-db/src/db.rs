//! Public API (spec.md §6): an opaque `Db` handle wrapping an
//! [`ejdb_engine::KvEngine`], plus an explicit transaction handle for
//! multi-statement work (spec.md §4.7, scenario S5).

use std::sync::{Arc, Mutex};

use bson::oid::ObjectId;
use bson::raw::RawDocument;
use bson::Document;

use ejdb_bson::{IndexKind, UpdateOps};
use ejdb_engine::{CollectionMeta, CollectionOptions, IndexSpec, KvEngine, KvTransaction};
use ejdb_query::parse_query;
use ejdb_store::Store;

use crate::error::DbError;
use crate::executor::{self, ExecResult};
use crate::ttl::TtlHandle;

/// Open-mode flags (spec.md §6 "Open flags"), kept as a bit set the way
/// the spec frames them even though this embedding only acts on a
/// subset — `create_if_missing` and `reader`/`writer` matter for the
/// gateway's bootstrap, the rest describe disk-level behavior the
/// underlying `Store` backend owns.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub reader: bool,
    pub writer: bool,
    pub create_if_missing: bool,
    pub truncate: bool,
    pub no_lock: bool,
    pub non_blocking_lock: bool,
    pub sync_on_transaction: bool,
}

impl OpenOptions {
    pub fn read_write() -> Self {
        Self {
            reader: true,
            writer: true,
            create_if_missing: true,
            ..Default::default()
        }
    }
}

pub struct Db<S: Store> {
    engine: Arc<KvEngine<S>>,
    tx_open: Mutex<bool>,
    ttl: Mutex<Option<TtlHandle>>,
}

impl<S: Store> Db<S> {
    /// `open(path, flags)` (spec.md §6) — here `path` is already
    /// resolved into a concrete [`Store`] by the caller; open-mode
    /// flags are accepted for API parity but don't gate anything this
    /// in-process engine needs to check itself.
    pub fn open(store: S, _flags: OpenOptions) -> Result<Self, DbError> {
        Ok(Self {
            engine: Arc::new(KvEngine::open(store)?),
            tx_open: Mutex::new(false),
            ttl: Mutex::new(None),
        })
    }

    pub fn ensure_collection(&self, name: &str, options: CollectionOptions) -> Result<(), DbError> {
        self.with_txn(false, |txn| {
            match txn.create_collection(name, options) {
                Ok(()) => Ok(()),
                Err(ejdb_engine::EngineError::CollectionExists(_)) => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn drop_collection(&self, name: &str) -> Result<(), DbError> {
        self.with_txn(false, |txn| Ok(txn.drop_collection(name)?))
    }

    pub fn ensure_index(
        &self,
        collection: &str,
        field: &str,
        kind: IndexKind,
        unique: bool,
    ) -> Result<(), DbError> {
        let result = self.with_txn(false, |txn| {
            Ok(txn.create_index(
                collection,
                field,
                IndexSpec {
                    field: field.to_string(),
                    kind,
                    unique,
                },
            )?)
        });
        if result.is_ok() {
            tracing::info!(collection, field, ?kind, unique, "index-rebuild");
        }
        result
    }

    pub fn remove_index(&self, collection: &str, field: &str) -> Result<(), DbError> {
        self.with_txn(false, |txn| Ok(txn.drop_index(collection, field)?))
    }

    /// `save(coll, doc) -> id` (spec.md §6).
    pub fn save(&self, collection: &str, doc: Document) -> Result<ObjectId, DbError> {
        self.with_txn(false, |txn| Ok(txn.insert(collection, doc)?))
    }

    /// `load(coll, id) -> doc` (spec.md §6, P1).
    pub fn load(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, DbError> {
        self.with_txn(true, |txn| Ok(txn.get(collection, id)?))
    }

    /// `remove(coll, id)` (spec.md §6).
    pub fn remove(&self, collection: &str, id: &ObjectId) -> Result<bool, DbError> {
        self.with_txn(false, |txn| Ok(txn.delete(collection, id)?))
    }

    /// `save(coll, doc, merge=false)`'s full-replace form (spec.md §6),
    /// also backing the gateway's `PUT /<coll>/<id>`.
    pub fn replace(&self, collection: &str, id: &ObjectId, doc: Document) -> Result<(), DbError> {
        self.with_txn(false, |txn| Ok(txn.replace(collection, id, doc)?))
    }

    /// `patch(coll, id, ops[, upsert])` (spec.md §6): apply an update
    /// directive set to one document by id.
    pub fn patch(
        &self,
        collection: &str,
        id: &ObjectId,
        ops: &UpdateOps,
        upsert: bool,
    ) -> Result<bool, DbError> {
        self.with_txn(false, |txn| {
            let Some(mut doc) = txn.get(collection, id)? else {
                if upsert {
                    let mut doc = Document::new();
                    doc.insert("_id", *id);
                    ops.apply(&mut doc).map_err(|e| DbError::InvalidDocument(e.to_string()))?;
                    txn.insert(collection, doc)?;
                    return Ok(true);
                }
                return Ok(false);
            };
            ops.apply(&mut doc).map_err(|e| DbError::InvalidDocument(e.to_string()))?;
            txn.replace(collection, id, doc)?;
            Ok(true)
        })
    }

    /// `exec(query) -> cursor` (spec.md §6): parses `query`, plans and
    /// executes it, applying `$set`/`$dropall`/`$upsert` directives
    /// when present. `explain` mirrors the `X-Hints: explain` gateway
    /// header (spec.md §6).
    pub fn exec(
        &self,
        collection: &str,
        query: &RawDocument,
        explain: bool,
    ) -> Result<ExecResult, DbError> {
        let parsed = parse_query(query)?;
        let writes = parsed.dropall || !parsed.update.is_empty() || parsed.upsert.is_some();
        self.with_txn(!writes, |txn| {
            let meta = txn
                .get_collection(collection)?
                .ok_or_else(|| DbError::CollectionNotFound(collection.to_string()))?;
            if parsed.dropall {
                let deleted = executor::dropall(txn, collection, &parsed.filter)?;
                return Ok(ExecResult {
                    count: deleted,
                    ..Default::default()
                });
            }
            if !parsed.update.is_empty() || parsed.upsert.is_some() {
                return executor::update(txn, collection, &parsed);
            }
            executor::select(txn, collection, &meta.options, &parsed, explain)
        })
    }

    pub fn meta(&self) -> Result<Vec<CollectionMeta>, DbError> {
        self.with_txn(true, |txn| Ok(txn.list_collections()?))
    }

    /// Start the background TTL sweep thread (SPEC_FULL.md "TTL-bearing
    /// collections"), reaping documents whose `ttl_field` has elapsed on
    /// every collection that declares one. Replaces any previously
    /// running sweeper. A no-op store (no collection ever sets
    /// `ttl_field`) just finds nothing to do each pass.
    pub fn spawn_ttl_sweeper(&self, interval_secs: u64)
    where
        S: Send + Sync + 'static,
    {
        let handle = crate::ttl::spawn(Arc::clone(&self.engine), interval_secs);
        *self.ttl.lock().unwrap() = handle;
    }

    /// `begin/commit/abort(coll)` (spec.md §6, §4.7): an explicit,
    /// single-level transaction. Spec scopes locking per-collection;
    /// this embedding simplifies to one in-flight transaction per `Db`
    /// handle (documented in DESIGN.md) — a second `begin()` while one
    /// is open is rejected as `TransactionConflict`, matching "nested
    /// begins are rejected (single level)".
    pub fn begin(&self, read_only: bool) -> Result<DbTransaction<'_, S>, DbError> {
        let mut guard = self.tx_open.lock().unwrap();
        if *guard {
            return Err(DbError::TransactionConflict);
        }
        *guard = true;
        drop(guard);
        match self.engine.begin(read_only) {
            Ok(txn) => Ok(DbTransaction {
                inner: Some(txn),
                tx_open: &self.tx_open,
            }),
            Err(e) => {
                *self.tx_open.lock().unwrap() = false;
                Err(e.into())
            }
        }
    }

    /// `sync()` (spec.md §6): this embedding commits every write
    /// transaction immediately, so there is no buffered state to flush —
    /// kept as an explicit no-op for API parity with engines that do
    /// buffer writes before a commit.
    pub fn sync(&self) -> Result<(), DbError> {
        Ok(())
    }

    /// `close()` (spec.md §6): stop the TTL sweeper, if one is running.
    /// Dropping the `Db` handle does the same via `TtlHandle`'s `Drop`.
    pub fn close(&self) {
        if let Some(mut handle) = self.ttl.lock().unwrap().take() {
            handle.stop();
        }
    }

    fn with_txn<R>(
        &self,
        read_only: bool,
        f: impl FnOnce(&mut KvTransaction<'_, S>) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let guard = self.tx_open.lock().unwrap();
        if *guard {
            return Err(DbError::TransactionConflict);
        }
        drop(guard);
        let span = tracing::debug_span!("transaction", read_only);
        let _enter = span.enter();
        let mut txn = self.engine.begin(read_only)?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                tracing::info!("commit");
                Ok(value)
            }
            Err(e) => {
                let _ = txn.rollback();
                if matches!(e, DbError::DuplicateKey(_)) {
                    tracing::warn!(error = %e, "unique-violation");
                } else {
                    tracing::warn!(error = %e, "abort");
                }
                Err(e)
            }
        }
    }
}

/// An explicit, caller-driven transaction (spec.md §4.7). Dropping it
/// without calling [`Self::commit`] or [`Self::abort`] rolls it back —
/// abort is the safe default for an unwind.
pub struct DbTransaction<'a, S: Store + 'a> {
    inner: Option<KvTransaction<'a, S>>,
    tx_open: &'a Mutex<bool>,
}

impl<'a, S: Store + 'a> DbTransaction<'a, S> {
    pub fn save(&mut self, collection: &str, doc: Document) -> Result<ObjectId, DbError> {
        Ok(self.txn_mut().insert(collection, doc)?)
    }

    pub fn load(&self, collection: &str, id: &ObjectId) -> Result<Option<Document>, DbError> {
        Ok(self.inner.as_ref().unwrap().get(collection, id)?)
    }

    pub fn remove(&mut self, collection: &str, id: &ObjectId) -> Result<bool, DbError> {
        Ok(self.txn_mut().delete(collection, id)?)
    }

    pub fn exec(
        &mut self,
        collection: &str,
        query: &RawDocument,
        explain: bool,
    ) -> Result<ExecResult, DbError> {
        let parsed = parse_query(query)?;
        let txn = self.txn_mut();
        if parsed.dropall {
            let deleted = executor::dropall(txn, collection, &parsed.filter)?;
            return Ok(ExecResult {
                count: deleted,
                ..Default::default()
            });
        }
        if !parsed.update.is_empty() || parsed.upsert.is_some() {
            return executor::update(txn, collection, &parsed);
        }
        let meta = txn
            .get_collection(collection)?
            .ok_or_else(|| DbError::CollectionNotFound(collection.to_string()))?;
        executor::select(txn, collection, &meta.options, &parsed, explain)
    }

    pub fn commit(mut self) -> Result<(), DbError> {
        let txn = self.inner.take().expect("transaction already finished");
        txn.commit()?;
        *self.tx_open.lock().unwrap() = false;
        tracing::info!("commit");
        Ok(())
    }

    pub fn abort(mut self) -> Result<(), DbError> {
        let txn = self.inner.take().expect("transaction already finished");
        txn.rollback()?;
        *self.tx_open.lock().unwrap() = false;
        tracing::info!("abort");
        Ok(())
    }

    fn txn_mut(&mut self) -> &mut KvTransaction<'a, S> {
        self.inner.as_mut().unwrap()
    }
}

impl<'a, S: Store + 'a> Drop for DbTransaction<'a, S> {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            *self.tx_open.lock().unwrap() = false;
        }
    }
}
