use std::ops::Bound;

use crate::error::StoreError;

/// An ordered, byte-keyed store divided into named namespaces.
///
/// This is the black-box "ordered map" / "page file" collaborator the
/// engine builds on: durability, on-disk layout, and free-space
/// recycling are all owned by the backend (an in-memory persistent map
/// for tests, `redb` for durable storage) rather than by this crate.
pub trait Store {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError>;

    /// Create a namespace (collection data, or an index) if it does not exist.
    fn create_namespace(&self, name: &str) -> Result<(), StoreError>;

    /// Drop a namespace and everything stored in it.
    fn drop_namespace(&self, name: &str) -> Result<(), StoreError>;
}

/// A single read/write transaction scoped to one [`Store`].
///
/// Keys are compared byte-lexicographically within a namespace; callers
/// that need case-insensitive or numeric ordering pre-encode their keys
/// so plain byte order already produces the desired comparator (see
/// `ejdb-bson`'s sortable key encodings).
pub trait Transaction {
    /// Opaque, cheaply-cloned handle to a namespace resolved once per
    /// transaction.
    type Ns: Clone;

    type Iter<'a>: Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>>
    where
        Self: 'a;

    fn namespace(&self, name: &str) -> Result<Self::Ns, StoreError>;

    fn get(&self, ns: &Self::Ns, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, ns: &Self::Ns, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Insert only if `key` is absent. Returns `false` without writing if
    /// the key is already present — the unique-index collision path.
    fn put_if_absent(
        &mut self,
        ns: &Self::Ns,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, StoreError>;

    fn delete(&mut self, ns: &Self::Ns, key: &[u8]) -> Result<(), StoreError>;

    /// Delete every key in `[start, end)`.
    fn delete_range(
        &mut self,
        ns: &Self::Ns,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<(), StoreError>;

    /// Ascending scan of every key carrying `prefix`.
    fn scan_prefix<'a>(&'a self, ns: &Self::Ns, prefix: &[u8]) -> Result<Self::Iter<'a>, StoreError>;

    /// Scan `[start, end)`, ascending unless `reverse` is set.
    fn scan_range<'a>(
        &'a self,
        ns: &Self::Ns,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<Self::Iter<'a>, StoreError>;

    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}
