//! APDU Response handling
//!
//! A Response contains data bytes plus SW1/SW2 status words.

use super::status::SW;
use super::APDUError;

/// A card response
///
/// # Example
/// ```ignore
/// let response = Response::from_bytes(&[0x01, 0x02, 0x90, 0x00]).unwrap();
/// assert_eq!(response.sw(), 0x9000);
/// assert_eq!(response.data, vec![0x01, 0x02]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Create a new response with data and status word
    pub fn new(data: Vec<u8>, sw: u16) -> Self {
        Self {
            data,
            sw1: (sw >> 8) as u8,
            sw2: sw as u8,
        }
    }

    /// Create a success response (0x9000) with data
    pub fn success(data: Vec<u8>) -> Self {
        Self::new(data, SW::SUCCESS)
    }

    /// Create an empty success response (0x9000)
    pub fn ok() -> Self {
        Self::success(Vec::new())
    }

    /// Create an error response (no data)
    pub fn error(sw: u16) -> Self {
        Self::new(Vec::new(), sw)
    }

    /// Split a raw reader answer into data and the trailing status word
    pub fn from_bytes(raw: &[u8]) -> Result<Self, APDUError> {
        if raw.len() < 2 {
            return Err(APDUError::ResponseTooShort(raw.len()));
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Convert to raw bytes for transmission (data + SW1 + SW2)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.data.len() + 2);
        result.extend_from_slice(&self.data);
        result.push(self.sw1);
        result.push(self.sw2);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response() {
        let resp = Response::success(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(resp.sw(), 0x9000);
        assert_eq!(resp.to_bytes(), vec![0xDE, 0xAD, 0xBE, 0xEF, 0x90, 0x00]);
    }

    #[test]
    fn test_ok_response() {
        let resp = Response::ok();
        assert!(resp.data.is_empty());
        assert_eq!(resp.to_bytes(), vec![0x90, 0x00]);
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        assert_eq!(resp.sw(), 0x6982);
        assert_eq!(resp.to_bytes(), vec![0x69, 0x82]);
    }

    #[test]
    fn test_from_bytes() {
        let resp = Response::from_bytes(&[0x11, 0x22, 0x90, 0x07]).unwrap();
        assert_eq!(resp.data, vec![0x11, 0x22]);
        assert_eq!(resp.sw(), 0x9007);

        let bare = Response::from_bytes(&[0x90, 0x00]).unwrap();
        assert!(bare.data.is_empty());
    }

    #[test]
    fn test_from_bytes_too_short() {
        assert_eq!(Response::from_bytes(&[0x90]), Err(APDUError::ResponseTooShort(1)));
    }
}
