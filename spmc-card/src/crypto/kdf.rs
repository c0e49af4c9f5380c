//! Password to key derivation
//!
//! The key is the password hashed with SHA-512 over and over, then cut to
//! the algorithm's key length. The round count is part of the card format:
//! a card written with one count only opens with the same count.

use zeroize::Zeroizing;

use super::catalog::{self, CatalogError};
use super::hash::HashOperations;

/// Rounds used by cards in the field
pub const DEFAULT_KDF_ITERATIONS: u32 = 1 << 20;

/// Derive the cipher key for `algorithm` from a password
pub fn derive_key(
    password: &str,
    algorithm: &str,
    iterations: u32,
) -> Result<Zeroizing<Vec<u8>>, CatalogError> {
    let key_len = catalog::describe(algorithm)?.key_len;

    let mut key = Zeroizing::new(password.as_bytes().to_vec());
    for _ in 0..iterations {
        key = Zeroizing::new(HashOperations::sha512(&key));
    }
    key.truncate(key_len);
    Ok(key)
}
