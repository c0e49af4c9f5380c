//! SLE4442 memory image
//!
//! Serializable contents of a virtual SLE4442: main memory, protection
//! bits, the programmable security code and its error counter.

use serde::{Deserialize, Serialize};

use super::sle4442::SLE4442_INFO;

/// Custom serde module for base64 encoding of byte vectors
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Factory programmable security code
pub const DEFAULT_PSC: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Error counter with all three attempts left
pub const ERROR_COUNTER_FULL: u8 = 0x07;

/// Size of the protection memory in bytes (one bit per protected byte)
pub const PROTECTION_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sle4442Image {
    #[serde(with = "base64_bytes")]
    pub memory: Vec<u8>,
    /// Bit i of byte i/8 set means address i is still writable
    #[serde(with = "base64_bytes")]
    pub protection: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub psc: Vec<u8>,
    /// Remaining PSC attempts as a 3-bit mask (0x07, 0x03, 0x01, 0x00)
    pub error_counter: u8,
}

impl Default for Sle4442Image {
    fn default() -> Self {
        Self {
            memory: vec![0xFF; SLE4442_INFO.capacity],
            protection: vec![0xFF; PROTECTION_BYTES],
            psc: DEFAULT_PSC.to_vec(),
            error_counter: ERROR_COUNTER_FULL,
        }
    }
}

impl Sle4442Image {
    /// Shape checks for images loaded from disk
    pub fn is_well_formed(&self) -> bool {
        self.memory.len() == SLE4442_INFO.capacity
            && self.protection.len() == PROTECTION_BYTES
            && self.psc.len() == SLE4442_INFO.pin_len
            && self.error_counter <= ERROR_COUNTER_FULL
    }

    pub fn is_protected(&self, address: usize) -> bool {
        match self.protection.get(address / 8) {
            Some(bits) => bits & (1 << (address % 8)) == 0,
            None => false,
        }
    }

    pub fn protect(&mut self, address: usize) {
        if let Some(bits) = self.protection.get_mut(address / 8) {
            *bits &= !(1 << (address % 8));
        }
    }

    pub fn is_locked(&self) -> bool {
        self.error_counter == 0
    }

    /// Clear the lowest remaining attempt bit
    pub fn consume_attempt(&mut self) {
        self.error_counter >>= 1;
    }
}
