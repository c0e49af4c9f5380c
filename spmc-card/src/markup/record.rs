//! Decoded card record

use std::fmt;

/// Record format version, stored as two bytes (major, minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
}

impl FormatVersion {
    /// Version written by this codec
    pub const CURRENT: FormatVersion = FormatVersion { major: 0, minor: 1 };

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            major: bytes[0],
            minor: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.major, self.minor]
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The seed record stored on a card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRecord {
    /// Card type name, e.g. "sle4442"
    pub card_type: String,
    /// Free-form owner text, at most 20 UTF-8 bytes
    pub contact_data: String,
    pub format_version: FormatVersion,
    /// Algorithm name from the catalog
    pub algorithm: String,
    /// BIP-39 word count of the stored seed
    pub word_count: u8,
    pub encrypted_seed: Vec<u8>,
    /// Empty for algorithms without an IV
    pub iv: Vec<u8>,
}

impl MarkupRecord {
    /// The header fields, without the secret payload
    pub fn metadata(&self) -> MarkupMetadata {
        MarkupMetadata {
            card_type: Some(self.card_type.clone()),
            contact_data: self.contact_data.clone(),
            format_version: self.format_version,
        }
    }
}

/// Header fields covered by the first checksum
///
/// Returned alongside corruption errors: once the header checksum has
/// passed these fields can be shown even if the payload is lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupMetadata {
    /// None when the card type wire id is not in the catalog
    pub card_type: Option<String>,
    pub contact_data: String,
    pub format_version: FormatVersion,
}

impl fmt::Display for MarkupMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(card_type) = &self.card_type {
            writeln!(f, "Card type: {}", card_type)?;
        }
        if !self.contact_data.is_empty() {
            writeln!(f, "Contact data: {}", self.contact_data)?;
        }
        write!(f, "Format version: {}", self.format_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version() {
        assert_eq!(FormatVersion::CURRENT.to_bytes(), [0x00, 0x01]);
        assert_eq!(FormatVersion::from_bytes([2, 7]).to_string(), "2.7");
        assert_eq!(FormatVersion::default(), FormatVersion::CURRENT);
    }

    #[test]
    fn test_metadata_display() {
        let metadata = MarkupMetadata {
            card_type: Some("sle4442".to_string()),
            contact_data: "alice@example.org".to_string(),
            format_version: FormatVersion::CURRENT,
        };
        assert_eq!(
            metadata.to_string(),
            "Card type: sle4442\nContact data: alice@example.org\nFormat version: 0.1"
        );

        let bare = MarkupMetadata {
            card_type: None,
            contact_data: String::new(),
            format_version: FormatVersion::CURRENT,
        };
        assert_eq!(bare.to_string(), "Format version: 0.1");
    }
}
