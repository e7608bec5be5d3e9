mod error;
mod store;

pub use error::StoreError;
pub use store::{Store, Transaction};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redb")]
mod redb_store;
#[cfg(feature = "redb")]
pub use redb_store::RedbStore;

/// Smallest byte string greater than every string carrying `prefix`, or
/// `None` if `prefix` is all `0xFF` (unbounded upper end). Shared by every
/// backend's `scan_prefix` implementation.
pub(crate) fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last != 0xFF {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}
