//! Cryptographic Operations
//!
//! Algorithm catalog, block cipher providers, the cipher session that
//! callers use, and the hashing behind record checksums and password keys.

pub mod catalog;
pub mod hash;
pub mod kdf;
pub mod modes;
pub mod provider;
pub mod session;

use thiserror::Error;

pub use self::catalog::{AlgorithmDescriptor, CatalogError, CipherFamily, CipherMode};
pub use self::hash::HashOperations;
pub use self::kdf::{derive_key, DEFAULT_KDF_ITERATIONS};
pub use self::provider::{provider_for, BlockCipherProvider};
pub use self::session::CipherSession;

/// Cipher configuration and transform errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("The key length must be {expected} bytes (actual {actual})")]
    WrongKeyLength { expected: usize, actual: usize },

    #[error("The initialization vector length must be {expected} bytes (actual {actual})")]
    WrongIVLength { expected: usize, actual: usize },

    #[error("Data length {len} is not a multiple of block size {block_len}")]
    UnalignedData { len: usize, block_len: usize },

    #[error("{len}-byte register is not usable for {mode}")]
    InvalidRegister { mode: CipherMode, len: usize },
}
