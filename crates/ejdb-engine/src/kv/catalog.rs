use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use bson::oid::ObjectId;
use bson::Document;
use ejdb_store::{Store, Transaction};

use ejdb_bson::OidGenerator;

use crate::encoding::{is_expired, CollectionMeta, CollectionOptions, IndexSpec, Key, KeyPrefix};
use crate::error::EngineError;
use crate::index::{self, IndexEntry, IndexRange};
use crate::kv::KvTransaction;
use crate::validate::validate_raw_document;

impl<'a, S: Store + 'a> KvTransaction<'a, S> {
    pub fn create_collection(
        &mut self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<(), EngineError> {
        if self.get_collection(name)?.is_some() {
            return Err(EngineError::CollectionExists(name.to_string()));
        }
        let meta = CollectionMeta::new(name, options);
        self.put_meta(&meta)
    }

    pub fn drop_collection(&mut self, name: &str) -> Result<(), EngineError> {
        let meta = self
            .get_collection(name)?
            .ok_or_else(|| EngineError::CollectionNotFound(name.to_string()))?;
        self.txn
            .delete(&self.catalog_ns, &Key::Collection(Cow::Borrowed(name)).encode())?;
        self.delete_prefix(KeyPrefix::Record(Cow::Borrowed(name)).encode())?;
        for spec in &meta.indexes {
            self.delete_index_prefix(
                KeyPrefix::IndexField(Cow::Borrowed(name), Cow::Borrowed(&spec.field)).encode(),
            )?;
        }
        Ok(())
    }

    pub fn get_collection(&self, name: &str) -> Result<Option<CollectionMeta>, EngineError> {
        let key = Key::Collection(Cow::Borrowed(name)).encode();
        Ok(self
            .txn
            .get(&self.catalog_ns, &key)?
            .and_then(|bytes| CollectionMeta::from_bytes(&bytes)))
    }

    pub fn list_collections(&self) -> Result<Vec<CollectionMeta>, EngineError> {
        let prefix = KeyPrefix::Collection.encode();
        let mut out = Vec::new();
        for item in self.txn.scan_prefix(&self.catalog_ns, &prefix)? {
            let (_, value) = item?;
            if let Some(meta) = CollectionMeta::from_bytes(&value) {
                out.push(meta);
            }
        }
        Ok(out)
    }

    /// Add an index to an existing collection, backfilling entries for
    /// every document already stored. Re-declaring an identical index
    /// is a no-op; declaring a different kind/uniqueness for a field
    /// that already has one is rejected.
    pub fn create_index(
        &mut self,
        collection: &str,
        field: &str,
        spec: IndexSpec,
    ) -> Result<(), EngineError> {
        let mut meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        if let Some(existing) = meta.index_on(field) {
            if existing.kind == spec.kind && existing.unique == spec.unique {
                return Ok(());
            }
            return Err(EngineError::InvalidKey(format!(
                "field '{field}' already has a differently-configured index"
            )));
        }

        let prefix = KeyPrefix::Record(Cow::Borrowed(collection)).encode();
        let mut backfill = Vec::new();
        for item in self.txn.scan_prefix(&self.records_ns, &prefix)? {
            let (key, value) = item?;
            let Some(Key::Record(_, doc_id)) = Key::decode(&key) else {
                continue;
            };
            let doc: Document = bson::from_slice(&value)?;
            backfill.push((doc_id, doc));
        }

        meta.indexes.push(spec.clone());
        for (doc_id, doc) in &backfill {
            for entry in index::entries_for_document(std::slice::from_ref(&spec), doc, doc_id) {
                self.write_index_entry(collection, doc_id, &entry, spec.unique)?;
            }
        }
        self.put_meta(&meta)
    }

    pub fn drop_index(&mut self, collection: &str, field: &str) -> Result<(), EngineError> {
        let mut meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        if meta.index_on(field).is_none() {
            return Ok(());
        }
        meta.indexes.retain(|ix| ix.field != field);
        self.delete_index_prefix(
            KeyPrefix::IndexField(Cow::Borrowed(collection), Cow::Borrowed(field)).encode(),
        )?;
        self.put_meta(&meta)
    }

    /// Insert a new document. Assigns an `_id` via [`OidGenerator`] if
    /// the document does not already carry one.
    pub fn insert(&mut self, collection: &str, mut doc: Document) -> Result<ObjectId, EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        let doc_id = match doc.get_object_id("_id") {
            Ok(id) => *id,
            Err(_) => {
                let id = OidGenerator::new().generate();
                doc.insert("_id", id);
                id
            }
        };
        let raw = bson::RawDocumentBuf::from_document(&doc)?;
        validate_raw_document(&raw)?;

        let record_key = Key::Record(Cow::Borrowed(collection), doc_id).encode();
        let bytes = bson::to_vec(&doc)?;
        if !self
            .txn
            .put_if_absent(&self.records_ns, &record_key, &bytes)?
        {
            return Err(EngineError::DuplicateKey(doc_id.to_hex()));
        }

        for entry in index::entries_for_document(&meta.indexes, &doc, &doc_id) {
            let unique = meta
                .index_on(&entry.field)
                .map(|ix| ix.unique)
                .unwrap_or(false);
            if let Err(e) = self.write_index_entry(collection, &doc_id, &entry, unique) {
                self.txn.delete(&self.records_ns, &record_key)?;
                return Err(e);
            }
        }
        Ok(doc_id)
    }

    pub fn get(&self, collection: &str, doc_id: &ObjectId) -> Result<Option<Document>, EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        let key = Key::Record(Cow::Borrowed(collection), *doc_id).encode();
        let Some(bytes) = self.txn.get(&self.records_ns, &key)? else {
            return Ok(None);
        };
        let doc: Document = bson::from_slice(&bytes)?;
        if is_expired(&doc, &meta.options, now_millis()) {
            return Ok(None);
        }
        Ok(Some(doc))
    }

    /// Replace a document in place, diffing old vs. new index entries
    /// so only the delta is written (spec.md §4.4).
    pub fn replace(
        &mut self,
        collection: &str,
        doc_id: &ObjectId,
        new_doc: Document,
    ) -> Result<(), EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        let record_key = Key::Record(Cow::Borrowed(collection), *doc_id).encode();
        let Some(old_bytes) = self.txn.get(&self.records_ns, &record_key)? else {
            return Err(EngineError::InvalidKey(format!(
                "no document '{}' in '{collection}'",
                doc_id.to_hex()
            )));
        };
        let old_doc: Document = bson::from_slice(&old_bytes)?;

        let raw = bson::RawDocumentBuf::from_document(&new_doc)?;
        validate_raw_document(&raw)?;

        let old_entries = index::entries_for_document(&meta.indexes, &old_doc, doc_id);
        let new_entries = index::entries_for_document(&meta.indexes, &new_doc, doc_id);

        for entry in &old_entries {
            if !new_entries.contains(entry) {
                self.delete_index_entry(collection, doc_id, entry)?;
            }
        }
        for entry in &new_entries {
            if !old_entries.contains(entry) {
                let unique = meta
                    .index_on(&entry.field)
                    .map(|ix| ix.unique)
                    .unwrap_or(false);
                self.write_index_entry(collection, doc_id, entry, unique)?;
            }
        }

        let bytes = bson::to_vec(&new_doc)?;
        self.txn.put(&self.records_ns, &record_key, &bytes)?;
        Ok(())
    }

    pub fn delete(&mut self, collection: &str, doc_id: &ObjectId) -> Result<bool, EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        let record_key = Key::Record(Cow::Borrowed(collection), *doc_id).encode();
        let Some(bytes) = self.txn.get(&self.records_ns, &record_key)? else {
            return Ok(false);
        };
        let doc: Document = bson::from_slice(&bytes)?;
        for entry in index::entries_for_document(&meta.indexes, &doc, doc_id) {
            self.delete_index_entry(collection, doc_id, &entry)?;
        }
        self.txn.delete(&self.records_ns, &record_key)?;
        Ok(true)
    }

    /// Ascending scan of every live (non-expired) document in a collection.
    pub fn scan(&self, collection: &str) -> Result<Vec<(ObjectId, Document)>, EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        let prefix = KeyPrefix::Record(Cow::Borrowed(collection)).encode();
        let now = now_millis();
        let mut out = Vec::new();
        for item in self.txn.scan_prefix(&self.records_ns, &prefix)? {
            let (key, value) = item?;
            let Some(Key::Record(_, doc_id)) = Key::decode(&key) else {
                continue;
            };
            let doc: Document = bson::from_slice(&value)?;
            if is_expired(&doc, &meta.options, now) {
                continue;
            }
            out.push((doc_id, doc));
        }
        Ok(out)
    }

    /// Physically delete every document whose `ttl_field` has elapsed.
    /// `scan`/`get` already hide these from readers; this reclaims their
    /// storage. Returns the number of documents removed.
    pub fn purge_expired(&mut self, collection: &str) -> Result<u64, EngineError> {
        let meta = self
            .get_collection(collection)?
            .ok_or_else(|| EngineError::CollectionNotFound(collection.to_string()))?;
        if meta.options.ttl_field.is_none() {
            return Ok(0);
        }
        let prefix = KeyPrefix::Record(Cow::Borrowed(collection)).encode();
        let now = now_millis();
        let mut expired = Vec::new();
        for item in self.txn.scan_prefix(&self.records_ns, &prefix)? {
            let (key, value) = item?;
            let Some(Key::Record(_, doc_id)) = Key::decode(&key) else {
                continue;
            };
            let doc: Document = bson::from_slice(&value)?;
            if is_expired(&doc, &meta.options, now) {
                expired.push(doc_id);
            }
        }
        let mut removed = 0u64;
        for doc_id in expired {
            if self.delete(collection, &doc_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Scan doc ids matching `range` on `field`'s index, in index order.
    pub fn scan_index(
        &self,
        collection: &str,
        field: &str,
        range: IndexRange<'_>,
    ) -> Result<Vec<ObjectId>, EngineError> {
        let iter = match range {
            IndexRange::Full => {
                let prefix =
                    KeyPrefix::IndexField(Cow::Borrowed(collection), Cow::Borrowed(field)).encode();
                self.txn.scan_prefix(&self.index_ns, &prefix)?
            }
            IndexRange::Eq(value) => {
                let prefix =
                    KeyPrefix::IndexValue(Cow::Borrowed(collection), Cow::Borrowed(field), value)
                        .encode();
                self.txn.scan_prefix(&self.index_ns, &prefix)?
            }
            IndexRange::Range { lower, upper } => {
                let field_prefix =
                    KeyPrefix::IndexField(Cow::Borrowed(collection), Cow::Borrowed(field)).encode();
                let lo = match lower {
                    std::ops::Bound::Unbounded => field_prefix.clone(),
                    std::ops::Bound::Included(v) | std::ops::Bound::Excluded(v) => {
                        let mut k = field_prefix.clone();
                        k.extend_from_slice(v);
                        k
                    }
                };
                let hi = match upper {
                    std::ops::Bound::Unbounded => None,
                    std::ops::Bound::Included(v) | std::ops::Bound::Excluded(v) => {
                        let mut k = field_prefix.clone();
                        k.extend_from_slice(v);
                        Some(k)
                    }
                };
                let upper_bound = match &hi {
                    Some(k) => std::ops::Bound::Excluded(k.as_slice()),
                    None => std::ops::Bound::Unbounded,
                };
                self.txn
                    .scan_range(&self.index_ns, std::ops::Bound::Included(lo.as_slice()), upper_bound, false)?
            }
        };
        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if let Some(Key::Index(_, _, _, doc_id)) = Key::decode(&key) {
                out.push(doc_id);
            }
        }
        Ok(out)
    }

    fn put_meta(&mut self, meta: &CollectionMeta) -> Result<(), EngineError> {
        let key = Key::Collection(Cow::Borrowed(&meta.name)).encode();
        self.txn.put(&self.catalog_ns, &key, &meta.to_bytes())?;
        Ok(())
    }

    fn write_index_entry(
        &mut self,
        collection: &str,
        doc_id: &ObjectId,
        entry: &IndexEntry,
        unique: bool,
    ) -> Result<(), EngineError> {
        let key = Key::Index(
            Cow::Borrowed(collection),
            Cow::Borrowed(&entry.field),
            entry.value_bytes.clone(),
            *doc_id,
        )
        .encode();
        let value = entry
            .postings
            .as_ref()
            .map(|p| p.to_bytes())
            .unwrap_or_default();
        if unique {
            let value_prefix = KeyPrefix::IndexValue(
                Cow::Borrowed(collection),
                Cow::Borrowed(&entry.field),
                &entry.value_bytes,
            )
            .encode();
            for item in self.txn.scan_prefix(&self.index_ns, &value_prefix)? {
                let (existing_key, _) = item?;
                if let Some(Key::Index(_, _, _, existing_id)) = Key::decode(&existing_key) {
                    if existing_id != *doc_id {
                        return Err(EngineError::DuplicateKey(format!(
                            "unique index on '{}' violated",
                            entry.field
                        )));
                    }
                }
            }
        }
        self.txn.put(&self.index_ns, &key, &value)?;
        Ok(())
    }

    fn delete_index_entry(
        &mut self,
        collection: &str,
        doc_id: &ObjectId,
        entry: &IndexEntry,
    ) -> Result<(), EngineError> {
        let key = Key::Index(
            Cow::Borrowed(collection),
            Cow::Borrowed(&entry.field),
            entry.value_bytes.clone(),
            *doc_id,
        )
        .encode();
        self.txn.delete(&self.index_ns, &key)?;
        Ok(())
    }

    /// Delete every record carrying `prefix` (a `KeyPrefix::Record(...)`
    /// encoding). Index prefixes are deleted separately with
    /// [`Self::delete_index_prefix`] since they live in a different
    /// namespace.
    fn delete_prefix(&mut self, prefix: Vec<u8>) -> Result<(), EngineError> {
        let keys: Vec<Vec<u8>> = self
            .txn
            .scan_prefix(&self.records_ns, &prefix)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        for key in keys {
            self.txn.delete(&self.records_ns, &key)?;
        }
        Ok(())
    }

    fn delete_index_prefix(&mut self, prefix: Vec<u8>) -> Result<(), EngineError> {
        let keys: Vec<Vec<u8>> = self
            .txn
            .scan_prefix(&self.index_ns, &prefix)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        for key in keys {
            self.txn.delete(&self.index_ns, &key)?;
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
