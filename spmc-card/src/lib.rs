//! Encrypted BIP-39 seed storage on SLE4442 memory cards
//!
//! A seed phrase is turned into its entropy, encrypted with one of the
//! cataloged GOST R 34.12/34.13, 3DES or AES-256 algorithms, wrapped in a
//! checksummed record and written to a memory card through a PC/SC style
//! reader.
//!
//! - [`crypto`]: algorithm catalog, block cipher providers, cipher session
//! - [`markup`]: the on-card record format
//! - [`mnemonic`]: word counts and BIP-39 conversion
//! - [`card`]: card types, the session state machine, a virtual SLE4442
//! - [`provision`]: write, read and recover a seed phrase end to end

pub mod apdu;
pub mod card;
pub mod config;
pub mod crypto;
pub mod error;
pub mod markup;
pub mod mnemonic;
pub mod provision;

pub use card::{CardSession, SessionError, SessionState, VirtualReader};
pub use config::Config;
pub use crypto::CipherSession;
pub use error::{Error, Result};
pub use markup::{MarkupCodec, MarkupError, MarkupRecord};
pub use provision::{read_markup, recover_seed_phrase, write_seed_phrase};
