//! Hash Operations
//!
//! SHA-256 for record checksums and SHA-512 for password hashing.

use digest::Digest;
use sha2::{Sha256, Sha512};

/// Length of a truncated record checksum
pub const CHECKSUM_LEN: usize = 4;

/// Hash Operations
pub struct HashOperations;

impl HashOperations {
    /// Compute SHA-256 hash
    pub fn sha256(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    /// Compute SHA-512 hash
    pub fn sha512(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha512::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    /// Leading bytes of SHA-256, as stored in the card record
    pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
        let digest = Self::sha256(data);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
        checksum
    }
}
