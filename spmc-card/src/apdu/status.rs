//! Status Word (SW) constants for reader responses
//!
//! ISO 7816-4 status words plus the memory-card specific PSC answer.

/// Status Word constants
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;
    pub const WRONG_DATA: u16 = 0x6A80;
    pub const INCORRECT_P1_P2: u16 = 0x6A86;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;

    /// Answer to PRESENT CODE: SW1 = 0x90, SW2 = remaining error counter bits
    ///
    /// 0x07 means all three attempts remain (the code was accepted).
    #[inline]
    pub fn code_counter(counter: u8) -> u16 {
        0x9000 | ((counter & 0x07) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_counter() {
        assert_eq!(SW::code_counter(0x07), 0x9007);
        assert_eq!(SW::code_counter(0x03), 0x9003);
        assert_eq!(SW::code_counter(0x00), SW::SUCCESS);
        assert_eq!(SW::code_counter(0xFF), 0x9007);
    }
}
