use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bson::oid::ObjectId;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generates document identifiers in EJDB's own 12-byte layout: 4-byte
/// seconds since epoch, 3-byte machine fingerprint, 2-byte process tag,
/// 3-byte counter. Stored as a [`bson::oid::ObjectId`] for wire
/// compatibility even though the byte layout differs from Mongo's own
/// (4-byte timestamp + 5-byte random + 3-byte counter).
///
/// Monotonicity holds for IDs generated within the same process (the
/// counter always advances); across processes uniqueness is
/// probabilistic, same as spec.md §9 describes.
pub struct OidGenerator {
    machine_id: [u8; 3],
    process_tag: [u8; 2],
}

impl OidGenerator {
    pub fn new() -> Self {
        Self {
            machine_id: machine_fingerprint(),
            process_tag: process_tag(),
        }
    }

    /// Build a generator with a fixed machine fingerprint, for
    /// reproducible tests (mirrors the `RANDSEED` override spec.md §6
    /// mentions for engine-recognized test seeding).
    pub fn with_machine_id(machine_id: [u8; 3]) -> Self {
        Self {
            machine_id,
            process_tag: process_tag(),
        }
    }

    pub fn generate(&self) -> ObjectId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&self.machine_id);
        bytes[7..9].copy_from_slice(&self.process_tag);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId::from_bytes(bytes)
    }
}

impl Default for OidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn machine_fingerprint() -> [u8; 3] {
    let name = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "ejdb-host".to_string());
    let hash = fnv1a(name.as_bytes());
    let b = hash.to_be_bytes();
    [b[0], b[1], b[2]]
}

fn process_tag() -> [u8; 2] {
    let pid = std::process::id();
    [(pid >> 8) as u8, pid as u8]
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_monotonic_counters() {
        let gen = OidGenerator::with_machine_id([1, 2, 3]);
        let a = gen.generate();
        let b = gen.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_calls_are_unique_within_a_batch() {
        let gen = OidGenerator::with_machine_id([9, 9, 9]);
        let ids: Vec<_> = (0..500).map(|_| gen.generate()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
