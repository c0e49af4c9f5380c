//! Record encoder and decoder

use std::ops::Range;

use log::{debug, warn};

use crate::card::types::{card_type, resolve_card_type};
use crate::crypto::catalog::{self, AlgorithmDescriptor, ALGORITHMS};
use crate::crypto::hash::{HashOperations, CHECKSUM_LEN};
use crate::mnemonic::{expected_plain_len, WORD_COUNTS};

use super::{FormatVersion, MarkupError, MarkupMetadata, MarkupRecord};

const CARD_TYPE: Range<usize> = 0..2;
const CONTACT_DATA: Range<usize> = 2..22;
const VERSION: Range<usize> = 22..24;
const CHECKSUM_1: Range<usize> = 24..28;
const ALGORITHM: Range<usize> = 28..30;
const WORD_COUNT: usize = 30;

/// Width of the contact data field
pub const CONTACT_DATA_LEN: usize = 20;

/// Bytes before the encrypted seed
pub const HEADER_LEN: usize = 31;

const SENTINEL: u8 = 0x80;

/// Stored seed length: rounded up to whole blocks for ECB and CBC
pub fn size_encrypted_seed(descriptor: &AlgorithmDescriptor, plain_len: usize) -> usize {
    if descriptor.mode.is_block_aligned() {
        plain_len.next_multiple_of(descriptor.block_len)
    } else {
        plain_len
    }
}

/// Shortest record any catalog algorithm can produce
fn smallest_record() -> usize {
    let min_plain = WORD_COUNTS
        .iter()
        .filter_map(|wc| expected_plain_len(*wc).ok())
        .min()
        .unwrap_or(0);
    let min_payload = ALGORITHMS
        .iter()
        .map(|alg| size_encrypted_seed(alg, min_plain) + alg.iv_size)
        .min()
        .unwrap_or(0);
    HEADER_LEN + min_payload + CHECKSUM_LEN
}

#[derive(Debug, Clone)]
pub struct MarkupCodec {
    min_size: usize,
}

impl Default for MarkupCodec {
    fn default() -> Self {
        Self {
            min_size: smallest_record(),
        }
    }
}

impl MarkupCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec refusing inputs shorter than `min_size`. Values below the
    /// fixed header length are raised to it.
    pub fn with_min_size(min_size: usize) -> Self {
        Self {
            min_size: min_size.max(HEADER_LEN),
        }
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn encode(&self, record: &MarkupRecord) -> Result<Vec<u8>, MarkupError> {
        if record.format_version != FormatVersion::CURRENT {
            return Err(MarkupError::UnsupportedVersion(record.format_version));
        }

        let card = card_type(&record.card_type)?;
        let contact = encode_contact(&record.contact_data)?;
        let descriptor = catalog::describe(&record.algorithm)?;
        let plain_len = expected_plain_len(record.word_count)
            .map_err(|_| MarkupError::InvalidWordCount(record.word_count))?;

        let seed_len = size_encrypted_seed(descriptor, plain_len);
        if record.encrypted_seed.len() != seed_len {
            return Err(MarkupError::SeedLengthMismatch {
                expected: seed_len,
                actual: record.encrypted_seed.len(),
            });
        }
        if record.iv.len() != descriptor.iv_size {
            return Err(MarkupError::IvLengthMismatch {
                expected: descriptor.iv_size,
                actual: record.iv.len(),
            });
        }

        let mut data = Vec::with_capacity(HEADER_LEN + seed_len + record.iv.len() + CHECKSUM_LEN);
        data.extend_from_slice(&card.wire_id);
        data.extend_from_slice(&contact);
        data.extend_from_slice(&record.format_version.to_bytes());
        let checksum = HashOperations::checksum(&data);
        data.extend_from_slice(&checksum);

        data.extend_from_slice(&descriptor.wire_id);
        data.push(record.word_count);
        data.extend_from_slice(&record.encrypted_seed);
        data.extend_from_slice(&record.iv);
        let checksum = HashOperations::checksum(&data);
        data.extend_from_slice(&checksum);

        debug!(
            "Encoded {} record: {} words, {} bytes",
            record.algorithm,
            record.word_count,
            data.len()
        );
        Ok(data)
    }

    /// Decode a record from the start of `bytes`
    ///
    /// The header checksum is verified before any length is derived from
    /// the algorithm or word count fields. Trailing bytes after the second
    /// checksum are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Result<MarkupRecord, MarkupError> {
        if bytes.len() < self.min_size {
            return Err(MarkupError::NotEnoughInformation {
                needed: self.min_size,
                actual: bytes.len(),
            });
        }

        if HashOperations::checksum(&bytes[..CHECKSUM_1.start]) != bytes[CHECKSUM_1] {
            debug!("Header checksum mismatch, not a record");
            return Err(MarkupError::CardIsNotMarkup);
        }

        let metadata = MarkupMetadata {
            card_type: resolve_card_type([bytes[CARD_TYPE.start], bytes[CARD_TYPE.start + 1]])
                .ok()
                .map(str::to_string),
            contact_data: decode_contact(&bytes[CONTACT_DATA]),
            format_version: FormatVersion::from_bytes([
                bytes[VERSION.start],
                bytes[VERSION.start + 1],
            ]),
        };
        let corrupted = |reason: &str| {
            warn!("Record payload is corrupted: {}", reason);
            MarkupError::DataIsCorrupted(Box::new(metadata.clone()))
        };

        let card_type = metadata
            .card_type
            .clone()
            .ok_or_else(|| corrupted("unknown card type"))?;
        let algorithm_id = [bytes[ALGORITHM.start], bytes[ALGORITHM.start + 1]];
        let algorithm =
            catalog::resolve_wire_id(algorithm_id).map_err(|_| corrupted("unknown algorithm"))?;
        let descriptor = catalog::describe(algorithm).map_err(|_| corrupted("unknown algorithm"))?;
        let word_count = bytes[WORD_COUNT];
        let plain_len =
            expected_plain_len(word_count).map_err(|_| corrupted("invalid word count"))?;

        let seed = HEADER_LEN..HEADER_LEN + size_encrypted_seed(descriptor, plain_len);
        let iv = seed.end..seed.end + descriptor.iv_size;
        let checksum_2 = iv.end..iv.end + CHECKSUM_LEN;
        if bytes.len() < checksum_2.end {
            return Err(corrupted("record runs past the end of the data"));
        }
        if HashOperations::checksum(&bytes[..iv.end]) != bytes[checksum_2] {
            return Err(corrupted("payload checksum mismatch"));
        }

        Ok(MarkupRecord {
            card_type,
            contact_data: metadata.contact_data,
            format_version: metadata.format_version,
            algorithm: algorithm.to_string(),
            word_count,
            encrypted_seed: bytes[seed].to_vec(),
            iv: bytes[iv].to_vec(),
        })
    }
}

/// Text, then a 0x80 terminator, then zero padding to the field width.
/// Text of exactly the field width is stored without terminator.
fn encode_contact(text: &str) -> Result<[u8; CONTACT_DATA_LEN], MarkupError> {
    let raw = text.as_bytes();
    if raw.len() > CONTACT_DATA_LEN {
        return Err(MarkupError::ContactDataTooLong { len: raw.len() });
    }
    if raw.len() == CONTACT_DATA_LEN && matches!(raw.last().copied(), Some(0x00 | SENTINEL)) {
        return Err(MarkupError::AmbiguousContactData);
    }

    let mut field = [0u8; CONTACT_DATA_LEN];
    field[..raw.len()].copy_from_slice(raw);
    if raw.len() < CONTACT_DATA_LEN {
        field[raw.len()] = SENTINEL;
    }
    Ok(field)
}

/// Everything before the last 0x80 once trailing zeros are removed.
/// Multi-byte UTF-8 characters may contain 0x80 themselves.
fn decode_contact(field: &[u8]) -> String {
    let text = match field.iter().rposition(|b| *b != 0) {
        Some(last) if field[last] == SENTINEL => &field[..last],
        Some(last) => &field[..=last],
        None => &[][..],
    };
    String::from_utf8_lossy(text).into_owned()
}
