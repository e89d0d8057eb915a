//! Deterministic hashing for canonical cause hashes.
//!
//! `std`'s `DefaultHasher` is randomly keyed per process. Cause hashes are
//! used as memoization keys and compared across test runs, so the canonical
//! form is hashed with a fixed-seed hasher instead.

use std::hash::{BuildHasher, Hash, Hasher};

/// Deterministic, non-cryptographic hasher.
#[derive(Debug, Clone)]
pub struct DetHasher {
    state: u64,
}

impl DetHasher {
    const SEED: u64 = 0x16f1_1fe8_9b0d_677c;
    const MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;

    /// Creates a hasher whose initial state is mixed with a domain tag.
    ///
    /// Distinct tags keep hashes of different value kinds (leaves, batches,
    /// whole canonical forms) apart even when their payloads coincide.
    #[must_use]
    pub fn with_domain(tag: u8) -> Self {
        let mut hasher = Self::default();
        hasher.write_u8(tag);
        hasher
    }

    fn mix(&mut self, word: u64) {
        self.state = self.state.wrapping_mul(Self::MULTIPLIER) ^ word;
    }
}

impl Default for DetHasher {
    fn default() -> Self {
        Self { state: Self::SEED }
    }
}

impl Hasher for DetHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(8);
        for chunk in &mut chunks {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            self.mix(u64::from_le_bytes(word));
        }
        for &byte in chunks.remainder() {
            self.mix(u64::from(byte));
        }
    }

    fn write_u8(&mut self, i: u8) {
        self.mix(u64::from(i));
    }

    fn write_u64(&mut self, i: u64) {
        self.mix(i);
    }

    fn write_usize(&mut self, i: usize) {
        self.mix(i as u64);
    }

    fn finish(&self) -> u64 {
        // fmix64 finalizer
        let mut h = self.state;
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
        h ^= h >> 33;
        h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        h ^= h >> 33;
        h
    }
}

/// Builder for deterministic hashers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetBuildHasher;

impl BuildHasher for DetBuildHasher {
    type Hasher = DetHasher;

    fn build_hasher(&self) -> Self::Hasher {
        DetHasher::default()
    }
}

/// Hashes a single value under a domain tag.
#[must_use]
pub fn hash_one<T: Hash + ?Sized>(tag: u8, value: &T) -> u64 {
    let mut hasher = DetHasher::with_domain(tag);
    value.hash(&mut hasher);
    hasher.finish()
}
