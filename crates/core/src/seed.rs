use crate::result::{Error, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// A 256-bit cryptographic seed
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// The 256-bit seed
    inner: [u8; 32],
}

impl Seed {
    /// Generate a new random 256-bit seed
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self { inner: seed }
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != 64 {
            return Err(Error::InvalidSeedLength(hex.len()));
        }

        let bytes = hex::decode(hex).map_err(|_| Error::InvalidSeedHex)?;
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self { inner: seed })
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner))
    }

    /// Create a deterministic RNG for source obfuscation passes.
    /// The same seed always produces an identical obfuscated program.
    pub fn create_deterministic_rng(&self) -> StdRng {
        // Hash the seed to create RNG seed
        let mut hasher = Sha3_256::new();
        hasher.update(b"VEIL_SOURCE_OBFUSCATION");
        hasher.update(self.inner);
        let seed_hash = hasher.finalize();

        // Convert first 8 bytes to u64 for StdRng
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&seed_hash[..8]);
        let rng_seed = u64::from_le_bytes(seed_bytes);

        StdRng::seed_from_u64(rng_seed)
    }

    /// Get a hash of this seed for integrity/identification purposes
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(self.inner);
        hasher.finalize().into()
    }

    /// Get the hash as hex string
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash()))
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed").field("hash", &self.hash_hex()).finish()
    }
}

/// Draws globally unique state ids from a pre-shuffled pool.
///
/// Every dispatch state in a flattening run comes out of one of these, so the
/// pool must be owned by the run rather than live in ambient global state;
/// exhaustion is fatal, never a silent wraparound.
pub struct IdAllocator {
    pool: Vec<u32>,
    next: usize,
}

impl IdAllocator {
    /// Build a pool of `capacity` unique positive ids in shuffled order.
    pub fn new(rng: &mut StdRng, capacity: u32) -> Self {
        let mut pool: Vec<u32> = (1..=capacity).collect();
        pool.shuffle(rng);
        Self { pool, next: 0 }
    }

    /// Draw the next unused id.
    pub fn next(&mut self) -> Result<u32> {
        let id = self
            .pool
            .get(self.next)
            .copied()
            .ok_or(Error::IdSpaceExhausted(self.next))?;
        self.next += 1;
        Ok(id)
    }

    /// Number of ids drawn so far.
    pub fn used(&self) -> usize {
        self.next
    }
}

const ALPHA_DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Yields unique alphanumeric suffixes for synthesized identifiers.
///
/// A suffix of length `len` is the base-32 rendering of `32^(len-1) + n` for a
/// unique `n`, which keeps every suffix exactly `len` characters and never
/// starting with `0`.
pub struct NameAllocator {
    ids: IdAllocator,
    offset: u64,
}

impl NameAllocator {
    pub fn new(rng: &mut StdRng, len: u32) -> Self {
        let offset = 32u64.pow(len - 1);
        let ids = IdAllocator::new(rng, (offset * 31) as u32);
        Self { ids, offset }
    }

    /// Draw the next unique suffix.
    pub fn get(&mut self) -> Result<String> {
        let n = self.offset + self.ids.next()? as u64;
        Ok(to_base32(n))
    }
}

fn to_base32(mut n: u64) -> String {
    let mut out = Vec::new();
    while n > 0 {
        out.push(ALPHA_DIGITS[(n % 32) as usize] as char);
        n /= 32;
    }
    out.iter().rev().collect()
}
