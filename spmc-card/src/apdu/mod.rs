//! APDU (Application Protocol Data Unit) handling
//!
//! Memory cards such as the SLE4442 have no APDU interface of their own.
//! The card reader exposes them through pseudo-APDUs with `CLA = 0xFF`,
//! which this module builds, encodes and parses.
//!
//! # Example
//! ```ignore
//! use spmc_card::apdu::{APDU, ins};
//!
//! // READ 16 bytes at address 0x20
//! let apdu = APDU::new(0xFF, ins::READ_MEMORY, 0x00, 0x20).with_le(16);
//! assert_eq!(apdu.to_bytes().unwrap(), vec![0xFF, 0xB0, 0x00, 0x20, 0x10]);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur while encoding or parsing APDUs
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum APDUError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Invalid APDU length")]
    InvalidLength,

    #[error("Command data of {0} bytes does not fit a short APDU")]
    DataTooLong(usize),

    #[error("Response too short: expected at least 2 bytes, got {0}")]
    ResponseTooShort(usize),
}

/// A short-format APDU command
///
/// # Fields
/// - `cla`: Class byte (0xFF for reader pseudo-APDUs)
/// - `ins`: Instruction byte (the command to execute)
/// - `p1`, `p2`: Parameter bytes (for memory cards P2 is the byte address)
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length (None if not specified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u32>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Set the expected response length
    pub fn with_le(mut self, le: u32) -> Self {
        self.le = Some(le);
        self
    }

    /// Encode into the short wire format: CLA INS P1 P2 [Lc Data] [Le]
    ///
    /// Le = 256 is encoded as 0x00.
    pub fn to_bytes(&self) -> Result<Vec<u8>, APDUError> {
        if self.data.len() > 255 {
            return Err(APDUError::DataTooLong(self.data.len()));
        }

        let mut raw = Vec::with_capacity(6 + self.data.len());
        raw.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);

        if !self.data.is_empty() {
            raw.push(self.data.len() as u8);
            raw.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            match le {
                1..=255 => raw.push(le as u8),
                256 => raw.push(0x00),
                _ => return Err(APDUError::InvalidLength),
            }
        }

        Ok(raw)
    }
}

/// Parse raw bytes into an APDU
///
/// Only the short format is supported: CLA INS P1 P2 [Lc Data] [Le]
///
/// # Example
/// ```ignore
/// let raw = &[0xFF, 0xB0, 0x00, 0x00, 0x00];  // READ with Le=256
/// let apdu = parse_apdu(raw).unwrap();
/// assert_eq!(apdu.ins, 0xB0);
/// assert_eq!(apdu.le, Some(256));
/// ```
pub fn parse_apdu(data: &[u8]) -> Result<APDU, APDUError> {
    if data.len() < 4 {
        return Err(APDUError::TooShort(data.len()));
    }

    let cla = data[0];
    let ins = data[1];
    let p1 = data[2];
    let p2 = data[3];
    let remaining = &data[4..];

    // Case 1: CLA INS P1 P2 (no data, no Le)
    if remaining.is_empty() {
        return Ok(APDU::new(cla, ins, p1, p2));
    }

    let first_byte = remaining[0];

    // Case 2: Only Le (1 byte) - Le=0 means 256
    if remaining.len() == 1 {
        let le = if first_byte == 0 { 256 } else { first_byte as u32 };
        return Ok(APDU::new(cla, ins, p1, p2).with_le(le));
    }

    // first_byte is Lc
    let lc = first_byte as usize;

    // Case 3: Lc + Data (no Le)
    if remaining.len() == 1 + lc {
        return Ok(APDU::with_data(cla, ins, p1, p2, remaining[1..1 + lc].to_vec()));
    }

    // Case 4: Lc + Data + Le
    if remaining.len() == 1 + lc + 1 {
        let le_byte = remaining[1 + lc];
        let le = if le_byte == 0 { 256 } else { le_byte as u32 };
        return Ok(APDU::with_data(cla, ins, p1, p2, remaining[1..1 + lc].to_vec()).with_le(le));
    }

    Err(APDUError::InvalidLength)
}

/// Convert a byte slice to a spaced hex string for logging
pub fn hexify(value: &[u8]) -> String {
    value.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Reader pseudo-APDU class byte
pub const CLA_READER: u8 = 0xFF;

/// Memory card instruction bytes (reader pseudo-APDUs)
pub mod ins {
    pub const SELECT_CARD_TYPE: u8 = 0xA4;
    pub const PRESENT_CODE: u8 = 0x20;
    pub const READ_MEMORY: u8 = 0xB0;
    pub const READ_PROTECTION_BITS: u8 = 0xB2;
    pub const WRITE_MEMORY: u8 = 0xD0;
    pub const WRITE_PROTECTION: u8 = 0xD1;
    pub const CHANGE_CODE: u8 = 0xD2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case1_no_data_no_le() {
        let apdu = parse_apdu(&[0xFF, 0xA4, 0x00, 0x00]).unwrap();
        assert_eq!(apdu.cla, 0xFF);
        assert_eq!(apdu.ins, 0xA4);
        assert!(apdu.data.is_empty());
        assert!(apdu.le.is_none());
    }

    #[test]
    fn test_case2_le_only() {
        let apdu = parse_apdu(&[0xFF, 0xB0, 0x00, 0x10, 0x00]).unwrap();
        assert_eq!(apdu.ins, ins::READ_MEMORY);
        assert_eq!(apdu.p2, 0x10);
        assert!(apdu.data.is_empty());
        assert_eq!(apdu.le, Some(256)); // 0x00 means 256
    }

    #[test]
    fn test_case3_lc_data() {
        let apdu = parse_apdu(&[0xFF, 0x20, 0x00, 0x00, 0x03, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(apdu.ins, ins::PRESENT_CODE);
        assert_eq!(apdu.data, vec![0xFF, 0xFF, 0xFF]);
        assert!(apdu.le.is_none());
    }

    #[test]
    fn test_case4_lc_data_le() {
        let apdu = parse_apdu(&[0x00, 0xA4, 0x04, 0x00, 0x02, 0xD2, 0x76, 0x00]).unwrap();
        assert_eq!(apdu.data, vec![0xD2, 0x76]);
        assert_eq!(apdu.le, Some(256));
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            parse_apdu(&[0xFF, 0xB0, 0x00]),
            Err(APDUError::TooShort(3))
        ));
    }

    #[test]
    fn test_encode_read() {
        let apdu = APDU::new(CLA_READER, ins::READ_MEMORY, 0x00, 0xFF).with_le(1);
        assert_eq!(apdu.to_bytes().unwrap(), vec![0xFF, 0xB0, 0x00, 0xFF, 0x01]);
    }

    #[test]
    fn test_encode_write_parses_back() {
        let apdu = APDU::with_data(CLA_READER, ins::WRITE_MEMORY, 0x00, 0x20, vec![0xAB; 255]);
        let raw = apdu.to_bytes().unwrap();
        assert_eq!(raw[4], 0xFF);
        assert_eq!(parse_apdu(&raw).unwrap(), apdu);
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let apdu = APDU::with_data(CLA_READER, ins::WRITE_MEMORY, 0x00, 0x00, vec![0; 256]);
        assert_eq!(apdu.to_bytes(), Err(APDUError::DataTooLong(256)));

        let apdu = APDU::new(CLA_READER, ins::READ_MEMORY, 0x00, 0x00).with_le(257);
        assert_eq!(apdu.to_bytes(), Err(APDUError::InvalidLength));
    }

    #[test]
    fn test_hexify() {
        assert_eq!(hexify(&[0xFF, 0x0A, 0x00]), "FF 0A 00");
        assert_eq!(hexify(&[]), "");
    }
}
