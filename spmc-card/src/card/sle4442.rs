//! SLE4442 command set
//!
//! The SLE4442 is a 256-byte synchronous memory card with a 3-byte
//! programmable security code (PSC). The first 32 bytes can be protected
//! against further writes, one protection bit per byte.
//!
//! A short APDU addresses one byte with P2, so a single command can touch
//! at most addresses 0..=255 with up to 255 bytes of data. Reading or
//! writing the full 256 bytes takes two commands: byte 255 first, then
//! bytes 0..=254.

use crate::apdu::{ins, APDU, CLA_READER};

use super::atr;
use super::types::{CardCommands, CardInfo, CommandError, SuccessCodes};

/// Card type selector understood by the reader (SLE4432 and SLE4442)
pub const SELECT_SLE4442: u8 = 0x06;

pub const SLE4442_INFO: CardInfo = CardInfo {
    capacity: 256,
    protection_area: Some(0..32),
    pin_len: 3,
    read_needs_pin: false,
    write_needs_pin: true,
    success: SuccessCodes {
        select_card_type: 0x9000,
        // 90 07: PSC accepted, all three attempts still available
        verify_pin: 0x9007,
        read: 0x9000,
        write: 0x9000,
        change_pin: 0x9000,
        read_protection: 0x9000,
        write_protection: 0x9000,
    },
};

/// Largest size a single read or write command can carry
const MAX_CHUNK: usize = 255;

pub struct Sle4442Commands;

impl Sle4442Commands {
    fn read_command(offset: usize, size: usize) -> APDU {
        APDU::new(CLA_READER, ins::READ_MEMORY, 0x00, offset as u8).with_le(size as u32)
    }

    fn write_command(offset: usize, data: &[u8]) -> APDU {
        APDU::with_data(CLA_READER, ins::WRITE_MEMORY, 0x00, offset as u8, data.to_vec())
    }
}

impl CardCommands for Sle4442Commands {
    fn recognizes_atr(&self, atr: &[u8]) -> bool {
        atr::is_sle4442(atr)
    }

    fn select_card_type(&self) -> Vec<APDU> {
        vec![APDU::with_data(CLA_READER, ins::SELECT_CARD_TYPE, 0x00, 0x00, vec![SELECT_SLE4442])]
    }

    fn verify_pin(&self, pin: &[u8]) -> Result<Vec<APDU>, CommandError> {
        SLE4442_INFO.check_pin(pin)?;
        Ok(vec![APDU::with_data(CLA_READER, ins::PRESENT_CODE, 0x00, 0x00, pin.to_vec())])
    }

    fn read(&self, offset: usize, size: usize) -> Result<Vec<APDU>, CommandError> {
        SLE4442_INFO.check_range(offset, size)?;

        if size > MAX_CHUNK {
            return Ok(vec![
                Self::read_command(MAX_CHUNK, 1),
                Self::read_command(offset, MAX_CHUNK),
            ]);
        }
        Ok(vec![Self::read_command(offset, size)])
    }

    fn write(&self, offset: usize, data: &[u8]) -> Result<Vec<APDU>, CommandError> {
        SLE4442_INFO.check_range(offset, data.len())?;

        if data.len() > MAX_CHUNK {
            let (head, last) = data.split_at(MAX_CHUNK);
            return Ok(vec![
                Self::write_command(MAX_CHUNK, last),
                Self::write_command(offset, head),
            ]);
        }
        Ok(vec![Self::write_command(offset, data)])
    }

    fn change_pin(&self, pin: &[u8]) -> Result<Vec<APDU>, CommandError> {
        SLE4442_INFO.check_pin(pin)?;
        Ok(vec![APDU::with_data(CLA_READER, ins::CHANGE_CODE, 0x00, 0x01, pin.to_vec())])
    }

    fn read_protection_bits(&self) -> Vec<APDU> {
        vec![APDU::new(CLA_READER, ins::READ_PROTECTION_BITS, 0x00, 0x00).with_le(4)]
    }

    fn write_protection(&self, offset: usize, data: &[u8]) -> Result<Vec<APDU>, CommandError> {
        let area = SLE4442_INFO.protection_area.clone().ok_or(CommandError::NoProtectionArea)?;
        let end = offset.checked_add(data.len());
        if offset < area.start || data.is_empty() || end.map_or(true, |end| end > area.end) {
            return Err(CommandError::InvalidRange {
                offset,
                size: data.len(),
                capacity: area.end,
            });
        }
        Ok(vec![APDU::with_data(
            CLA_READER,
            ins::WRITE_PROTECTION,
            0x00,
            offset as u8,
            data.to_vec(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(apdus: &[APDU]) -> Vec<Vec<u8>> {
        apdus.iter().map(|a| a.to_bytes().unwrap()).collect()
    }

    #[test]
    fn test_recognizes_atr() {
        assert!(Sle4442Commands.recognizes_atr(&[0x3B, 0x04, 0xA2, 0x13, 0x10, 0x91]));
        assert!(!Sle4442Commands.recognizes_atr(&[0x3B, 0x04, 0x92, 0x23, 0x10, 0x91]));
    }

    #[test]
    fn test_select_card_type() {
        let cmds = encode(&Sle4442Commands.select_card_type());
        assert_eq!(cmds, vec![vec![0xFF, 0xA4, 0x00, 0x00, 0x01, 0x06]]);
    }

    #[test]
    fn test_verify_pin() {
        let cmds = encode(&Sle4442Commands.verify_pin(&[0x12, 0x34, 0x56]).unwrap());
        assert_eq!(cmds, vec![vec![0xFF, 0x20, 0x00, 0x00, 0x03, 0x12, 0x34, 0x56]]);

        assert_eq!(
            Sle4442Commands.verify_pin(&[0xFF; 4]),
            Err(CommandError::InvalidPinLength { expected: 3, actual: 4 })
        );
    }

    #[test]
    fn test_read_single_command() {
        let cmds = encode(&Sle4442Commands.read(0x20, 16).unwrap());
        assert_eq!(cmds, vec![vec![0xFF, 0xB0, 0x00, 0x20, 0x10]]);

        let cmds = encode(&Sle4442Commands.read(1, 255).unwrap());
        assert_eq!(cmds, vec![vec![0xFF, 0xB0, 0x00, 0x01, 0xFF]]);
    }

    #[test]
    fn test_read_full_card_splits_last_byte_first() {
        let cmds = encode(&Sle4442Commands.read(0, 256).unwrap());
        assert_eq!(
            cmds,
            vec![
                vec![0xFF, 0xB0, 0x00, 0xFF, 0x01],
                vec![0xFF, 0xB0, 0x00, 0x00, 0xFF],
            ]
        );
    }

    #[test]
    fn test_write_full_card_splits_last_byte_first() {
        let data: Vec<u8> = (0..=255).collect();
        let cmds = Sle4442Commands.write(0, &data).unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].p2, 0xFF);
        assert_eq!(cmds[0].data, vec![0xFF]);
        assert_eq!(cmds[1].p2, 0x00);
        assert_eq!(cmds[1].data, data[..255].to_vec());
    }

    #[test]
    fn test_range_checks() {
        assert!(Sle4442Commands.read(0, 0).is_err());
        assert!(Sle4442Commands.read(256, 1).is_err());
        assert!(Sle4442Commands.read(10, 250).is_err());
        assert!(Sle4442Commands.write(255, &[0, 0]).is_err());
        assert!(Sle4442Commands.write(0, &[]).is_err());
    }

    #[test]
    fn test_change_pin() {
        let cmds = encode(&Sle4442Commands.change_pin(&[1, 2, 3]).unwrap());
        assert_eq!(cmds, vec![vec![0xFF, 0xD2, 0x00, 0x01, 0x03, 0x01, 0x02, 0x03]]);
    }

    #[test]
    fn test_protection_commands() {
        let cmds = encode(&Sle4442Commands.read_protection_bits());
        assert_eq!(cmds, vec![vec![0xFF, 0xB2, 0x00, 0x00, 0x04]]);

        let cmds = encode(&Sle4442Commands.write_protection(30, &[0xAA, 0xBB]).unwrap());
        assert_eq!(cmds, vec![vec![0xFF, 0xD1, 0x00, 0x1E, 0x02, 0xAA, 0xBB]]);

        assert!(Sle4442Commands.write_protection(0, &[0u8; 32]).is_ok());
        assert!(Sle4442Commands.write_protection(31, &[0, 0]).is_err());
        assert!(Sle4442Commands.write_protection(32, &[0]).is_err());
        assert!(Sle4442Commands.write_protection(0, &[]).is_err());
    }
}
