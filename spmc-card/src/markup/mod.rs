//! Card record ("markup") format
//!
//! A card holds a single record starting at address 0:
//!
//! ```text
//! [0:2)          card type wire id
//! [2:22)         contact data: UTF-8 text, 0x80 terminator, zero padding
//! [22:24)        format version (major, minor)
//! [24:28)        checksum 1 = SHA-256([0:24))[..4]
//! [28:30)        algorithm wire id
//! [30]           word count
//! [31:31+S)      encrypted seed
//! [31+S:31+S+I)  IV
//! [31+S+I:+4)    checksum 2 = SHA-256([0:31+S+I))[..4]
//! ```
//!
//! S and I have no length prefix. They follow from the algorithm and the
//! word count, which are only trusted once checksum 1 has passed.

mod codec;
mod record;

pub use codec::{size_encrypted_seed, MarkupCodec, CONTACT_DATA_LEN, HEADER_LEN};
pub use record::{FormatVersion, MarkupMetadata, MarkupRecord};

use thiserror::Error;

use crate::crypto::CatalogError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("Not enough information: need at least {needed} bytes, got {actual}")]
    NotEnoughInformation { needed: usize, actual: usize },

    #[error("The card is not marked up")]
    CardIsNotMarkup,

    #[error("The data is corrupted")]
    DataIsCorrupted(Box<MarkupMetadata>),

    #[error("Contact data is {len} bytes, at most 20 allowed")]
    ContactDataTooLong { len: usize },

    #[error("Contact data filling all 20 bytes must not end in 0x00 or 0x80")]
    AmbiguousContactData,

    #[error("Unsupported format version {0}")]
    UnsupportedVersion(FormatVersion),

    #[error("Invalid word count: {0}")]
    InvalidWordCount(u8),

    #[error("Encrypted seed is {actual} bytes, expected {expected}")]
    SeedLengthMismatch { expected: usize, actual: usize },

    #[error("IV is {actual} bytes, expected {expected}")]
    IvLengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl MarkupError {
    /// Header fields salvaged from a damaged record
    pub fn metadata(&self) -> Option<&MarkupMetadata> {
        match self {
            MarkupError::DataIsCorrupted(metadata) => Some(metadata),
            _ => None,
        }
    }
}
