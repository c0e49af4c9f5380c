//! Card type catalog
//!
//! Every supported memory card family is described by a name, the wire id
//! stored in the card record, its [`CardInfo`] and a [`CardCommands`]
//! implementation that builds the reader pseudo-APDUs.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::apdu::APDU;
use crate::crypto::CatalogError;

use super::sle4442::{Sle4442Commands, SLE4442_INFO};

/// Caller precondition errors raised while building commands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid range: offset {offset}, size {size} (capacity {capacity})")]
    InvalidRange {
        offset: usize,
        size: usize,
        capacity: usize,
    },

    #[error("Invalid PIN length: expected {expected}, got {actual}")]
    InvalidPinLength { expected: usize, actual: usize },

    #[error("Card type has no protection memory")]
    NoProtectionArea,
}

/// Protocol operations with their own success status word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SelectCardType,
    VerifyPin,
    Read,
    Write,
    ChangePin,
    ReadProtection,
    WriteProtection,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SelectCardType => "select_card_type",
            Operation::VerifyPin => "verify_pin",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::ChangePin => "change_pin",
            Operation::ReadProtection => "read_protection_bits",
            Operation::WriteProtection => "write_protection",
        };
        f.write_str(name)
    }
}

/// Status words that mean success, per operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCodes {
    pub select_card_type: u16,
    pub verify_pin: u16,
    pub read: u16,
    pub write: u16,
    pub change_pin: u16,
    pub read_protection: u16,
    pub write_protection: u16,
}

impl SuccessCodes {
    pub fn for_operation(&self, operation: Operation) -> u16 {
        match operation {
            Operation::SelectCardType => self.select_card_type,
            Operation::VerifyPin => self.verify_pin,
            Operation::Read => self.read,
            Operation::Write => self.write,
            Operation::ChangePin => self.change_pin,
            Operation::ReadProtection => self.read_protection,
            Operation::WriteProtection => self.write_protection,
        }
    }
}

/// Technical data of a card family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    /// Addressable memory in bytes
    pub capacity: usize,
    /// Addresses that can be irreversibly write-protected
    pub protection_area: Option<Range<usize>>,
    /// PIN length in bytes, 0 for cards without a PIN
    pub pin_len: usize,
    pub read_needs_pin: bool,
    pub write_needs_pin: bool,
    pub success: SuccessCodes,
}

impl CardInfo {
    /// Check `0 <= offset < capacity`, `1 <= size` and `offset + size <= capacity`
    pub fn check_range(&self, offset: usize, size: usize) -> Result<(), CommandError> {
        let valid = offset < self.capacity
            && size >= 1
            && offset.checked_add(size).is_some_and(|end| end <= self.capacity);
        if !valid {
            return Err(CommandError::InvalidRange {
                offset,
                size,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn check_pin(&self, pin: &[u8]) -> Result<(), CommandError> {
        if pin.len() != self.pin_len {
            return Err(CommandError::InvalidPinLength {
                expected: self.pin_len,
                actual: pin.len(),
            });
        }
        Ok(())
    }
}

/// Builds the command sequence for each protocol operation
///
/// Every method returns the APDUs in the order they must be issued.
pub trait CardCommands: Send + Sync {
    /// Whether the reader-reported ATR looks like this card family
    fn recognizes_atr(&self, _atr: &[u8]) -> bool {
        true
    }

    fn select_card_type(&self) -> Vec<APDU>;

    fn verify_pin(&self, pin: &[u8]) -> Result<Vec<APDU>, CommandError>;

    /// Read commands. Response data is reassembled by concatenating the
    /// responses in reverse issue order.
    fn read(&self, offset: usize, size: usize) -> Result<Vec<APDU>, CommandError>;

    /// Write commands, split the same way as [`CardCommands::read`]
    fn write(&self, offset: usize, data: &[u8]) -> Result<Vec<APDU>, CommandError>;

    fn change_pin(&self, pin: &[u8]) -> Result<Vec<APDU>, CommandError>;

    fn read_protection_bits(&self) -> Vec<APDU>;

    /// Irreversibly protect `data.len()` bytes starting at `offset`
    fn write_protection(&self, offset: usize, data: &[u8]) -> Result<Vec<APDU>, CommandError>;
}

/// One supported card family
pub struct CardType {
    pub name: &'static str,
    pub wire_id: [u8; 2],
    pub info: CardInfo,
    pub commands: &'static dyn CardCommands,
}

impl fmt::Debug for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardType")
            .field("name", &self.name)
            .field("wire_id", &self.wire_id)
            .field("info", &self.info)
            .finish()
    }
}

pub static CARD_TYPES: Lazy<Vec<CardType>> = Lazy::new(|| {
    vec![CardType {
        name: "sle4442",
        wire_id: [0x00, 0x01],
        info: SLE4442_INFO,
        commands: &Sle4442Commands,
    }]
});

static BY_WIRE_ID: Lazy<HashMap<[u8; 2], &'static str>> =
    Lazy::new(|| CARD_TYPES.iter().map(|t| (t.wire_id, t.name)).collect());

/// Look up a card type by name
pub fn card_type(name: &str) -> Result<&'static CardType, CatalogError> {
    CARD_TYPES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| CatalogError::UnknownCardType(name.to_string()))
}

/// Map a record wire id back to the card type name
pub fn resolve_card_type(id: [u8; 2]) -> Result<&'static str, CatalogError> {
    BY_WIRE_ID
        .get(&id)
        .copied()
        .ok_or_else(|| CatalogError::UnknownCardType(format!("0x{:02X}{:02X}", id[0], id[1])))
}

/// Card type names in catalog order
pub fn card_type_names() -> Vec<&'static str> {
    CARD_TYPES.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_type_lookup() {
        let sle = card_type("sle4442").unwrap();
        assert_eq!(sle.wire_id, [0x00, 0x01]);
        assert_eq!(sle.info.capacity, 256);
        assert_eq!(resolve_card_type([0x00, 0x01]).unwrap(), "sle4442");
        assert_eq!(card_type_names(), vec!["sle4442"]);
    }

    #[test]
    fn test_unknown_card_type() {
        assert!(matches!(
            card_type("sle5528"),
            Err(CatalogError::UnknownCardType(name)) if name == "sle5528"
        ));
        assert!(matches!(
            resolve_card_type([0xAB, 0xCD]),
            Err(CatalogError::UnknownCardType(id)) if id == "0xABCD"
        ));
    }

    #[test]
    fn test_success_codes() {
        let success = &SLE4442_INFO.success;
        assert_eq!(success.for_operation(Operation::VerifyPin), 0x9007);
        assert_eq!(success.for_operation(Operation::Read), 0x9000);
        assert_eq!(success.for_operation(Operation::WriteProtection), 0x9000);
    }

    #[test]
    fn test_check_range() {
        let info = &SLE4442_INFO;
        assert!(info.check_range(0, 256).is_ok());
        assert!(info.check_range(255, 1).is_ok());
        assert!(info.check_range(0, 0).is_err());
        assert!(info.check_range(256, 1).is_err());
        assert_eq!(
            info.check_range(200, 57),
            Err(CommandError::InvalidRange { offset: 200, size: 57, capacity: 256 })
        );
        assert!(info.check_range(1, usize::MAX).is_err());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::VerifyPin.to_string(), "verify_pin");
        assert_eq!(Operation::ReadProtection.to_string(), "read_protection_bits");
    }
}
