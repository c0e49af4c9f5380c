//! Modes of operation
//!
//! GOST R 34.13-2015 style modes over any RustCrypto block cipher. The IV
//! is the shift register, so its length may be a multiple of the block
//! length (m = 2n, 3n, ...). With m = n these reduce to the usual
//! CBC/OFB/CFB definitions.

use cipher::{Block, BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit, KeySizeUser};
use log::debug;

use super::catalog::CipherMode;
use super::CipherError;

/// Feedback segment width for CFB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfbSegment {
    /// s = n, as GOST R 34.13 uses
    FullBlock,
    /// s = 8 bits (CFB-8)
    Byte,
}

/// A keyed block cipher plus the mode arithmetic around it
pub struct ModeEngine<C> {
    cipher: C,
    cfb_segment: CfbSegment,
}

impl<C> ModeEngine<C>
where
    C: BlockEncrypt + BlockDecrypt + KeyInit,
{
    /// Key the cipher
    pub fn new(key: &[u8], cfb_segment: CfbSegment) -> Result<Self, CipherError> {
        let cipher = C::new_from_slice(key).map_err(|_| CipherError::WrongKeyLength {
            expected: <C as KeySizeUser>::key_size(),
            actual: key.len(),
        })?;
        Ok(Self { cipher, cfb_segment })
    }

    /// Block length in bytes
    pub fn block_size() -> usize {
        <C as BlockSizeUser>::block_size()
    }

    pub fn encrypt(
        &self,
        mode: CipherMode,
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        debug!("{} encrypting {} bytes", mode, data.len());
        match mode {
            CipherMode::Ecb => self.ecb(data, true),
            CipherMode::Cbc => self.cbc_encrypt(iv, data),
            CipherMode::Ctr => self.ctr(iv, data),
            CipherMode::Ofb => self.ofb(iv, data),
            CipherMode::Cfb => self.cfb(iv, data, true),
        }
    }

    pub fn decrypt(
        &self,
        mode: CipherMode,
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        debug!("{} decrypting {} bytes", mode, data.len());
        match mode {
            CipherMode::Ecb => self.ecb(data, false),
            CipherMode::Cbc => self.cbc_decrypt(iv, data),
            CipherMode::Ctr => self.ctr(iv, data),
            CipherMode::Ofb => self.ofb(iv, data),
            CipherMode::Cfb => self.cfb(iv, data, false),
        }
    }

    fn encrypt_block(&self, input: &[u8]) -> Vec<u8> {
        let mut block = Block::<C>::clone_from_slice(input);
        self.cipher.encrypt_block(&mut block);
        block.to_vec()
    }

    fn decrypt_block(&self, input: &[u8]) -> Vec<u8> {
        let mut block = Block::<C>::clone_from_slice(input);
        self.cipher.decrypt_block(&mut block);
        block.to_vec()
    }

    fn ensure_aligned(data: &[u8]) -> Result<(), CipherError> {
        let n = Self::block_size();
        if data.len() % n != 0 {
            return Err(CipherError::UnalignedData {
                len: data.len(),
                block_len: n,
            });
        }
        Ok(())
    }

    /// The register must hold at least one block and a whole number of blocks
    fn ensure_register(mode: CipherMode, iv: &[u8]) -> Result<(), CipherError> {
        let n = Self::block_size();
        if iv.len() < n || iv.len() % n != 0 {
            return Err(CipherError::InvalidRegister { mode, len: iv.len() });
        }
        Ok(())
    }

    fn ecb(&self, data: &[u8], encrypt: bool) -> Result<Vec<u8>, CipherError> {
        Self::ensure_aligned(data)?;

        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(Self::block_size()) {
            let block = if encrypt {
                self.encrypt_block(chunk)
            } else {
                self.decrypt_block(chunk)
            };
            result.extend_from_slice(&block);
        }
        Ok(result)
    }

    fn cbc_encrypt(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Self::ensure_aligned(data)?;
        Self::ensure_register(CipherMode::Cbc, iv)?;

        let n = Self::block_size();
        let mut register = iv.to_vec();
        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(n) {
            let block = self.encrypt_block(&xor(chunk, &register[..n]));
            shift_register(&mut register, &block);
            result.extend_from_slice(&block);
        }
        Ok(result)
    }

    fn cbc_decrypt(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Self::ensure_aligned(data)?;
        Self::ensure_register(CipherMode::Cbc, iv)?;

        let n = Self::block_size();
        let mut register = iv.to_vec();
        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(n) {
            let plain = xor(&self.decrypt_block(chunk), &register[..n]);
            shift_register(&mut register, chunk);
            result.extend_from_slice(&plain);
        }
        Ok(result)
    }

    /// Counter block starts as IV || 0..0 and counts per block, big-endian
    fn ctr(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        let n = Self::block_size();
        if iv.is_empty() || iv.len() > n {
            return Err(CipherError::InvalidRegister {
                mode: CipherMode::Ctr,
                len: iv.len(),
            });
        }

        let mut counter = iv.to_vec();
        counter.resize(n, 0);
        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(n) {
            let gamma = self.encrypt_block(&counter);
            result.extend(xor(chunk, &gamma));
            increment(&mut counter);
        }
        Ok(result)
    }

    fn ofb(&self, iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Self::ensure_register(CipherMode::Ofb, iv)?;

        let n = Self::block_size();
        let mut register = iv.to_vec();
        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(n) {
            let gamma = self.encrypt_block(&register[..n]);
            result.extend(xor(chunk, &gamma));
            shift_register(&mut register, &gamma);
        }
        Ok(result)
    }

    fn cfb(&self, iv: &[u8], data: &[u8], encrypt: bool) -> Result<Vec<u8>, CipherError> {
        Self::ensure_register(CipherMode::Cfb, iv)?;

        let n = Self::block_size();
        let segment = match self.cfb_segment {
            CfbSegment::FullBlock => n,
            CfbSegment::Byte => 1,
        };

        let mut register = iv.to_vec();
        let mut result = Vec::with_capacity(data.len());
        for chunk in data.chunks(segment) {
            let gamma = self.encrypt_block(&register[..n]);
            let out = xor(chunk, &gamma);
            // Feedback is always the ciphertext segment
            let feedback = if encrypt { out.as_slice() } else { chunk };
            shift_register(&mut register, feedback);
            result.extend_from_slice(&out);
        }
        Ok(result)
    }
}

/// XOR up to the shorter of the two inputs
fn xor(data: &[u8], gamma: &[u8]) -> Vec<u8> {
    data.iter().zip(gamma).map(|(a, b)| a ^ b).collect()
}

/// R = LSB(R) || feedback
fn shift_register(register: &mut Vec<u8>, feedback: &[u8]) {
    let len = feedback.len().min(register.len());
    register.drain(..len);
    register.extend_from_slice(&feedback[..len]);
}

fn increment(counter: &mut [u8]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::Aes256;
    use des::TdesEde3;

    #[test]
    fn test_increment_carries() {
        let mut counter = [0x00, 0xFF, 0xFF];
        increment(&mut counter);
        assert_eq!(counter, [0x01, 0x00, 0x00]);

        let mut wrap = [0xFF, 0xFF];
        increment(&mut wrap);
        assert_eq!(wrap, [0x00, 0x00]);
    }

    #[test]
    fn test_shift_register() {
        let mut register = vec![1, 2, 3, 4];
        shift_register(&mut register, &[9, 8]);
        assert_eq!(register, vec![3, 4, 9, 8]);
    }

    #[test]
    fn test_aes256_fips197_block() {
        let key = hex::decode(concat!(
            "000102030405060708090a0b0c0d0e0f",
            "101112131415161718191a1b1c1d1e1f"
        ))
        .unwrap();
        let plaintext = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let engine = ModeEngine::<Aes256>::new(&key, CfbSegment::Byte).unwrap();

        let ciphertext = engine.encrypt(CipherMode::Ecb, &[], &plaintext).unwrap();
        assert_eq!(hex::encode(&ciphertext), "8ea2b7ca516745bfeafc49904b496089");
        assert_eq!(engine.decrypt(CipherMode::Ecb, &[], &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_cfb8_matches_byte_at_a_time_definition() {
        let key = [0x01u8; 24];
        let iv = [0x02u8; 8];
        let engine = ModeEngine::<TdesEde3>::new(&key, CfbSegment::Byte).unwrap();
        let data = b"thirteen byte";

        let ciphertext = engine.encrypt(CipherMode::Cfb, &iv, data).unwrap();

        // Encrypting the first byte alone must give the same first byte
        let first = engine.encrypt(CipherMode::Cfb, &iv, &data[..1]).unwrap();
        assert_eq!(first[0], ciphertext[0]);
        assert_eq!(engine.decrypt(CipherMode::Cfb, &iv, &ciphertext).unwrap(), data);
    }

    #[test]
    fn test_wrong_key_length() {
        let result = ModeEngine::<TdesEde3>::new(&[0u8; 16], CfbSegment::Byte);
        assert!(matches!(
            result,
            Err(CipherError::WrongKeyLength { expected: 24, actual: 16 })
        ));
    }

    #[test]
    fn test_unaligned_ecb_rejected() {
        let engine = ModeEngine::<TdesEde3>::new(&[0x01u8; 24], CfbSegment::Byte).unwrap();
        assert!(matches!(
            engine.encrypt(CipherMode::Ecb, &[], &[0u8; 7]),
            Err(CipherError::UnalignedData { len: 7, block_len: 8 })
        ));
    }

    #[test]
    fn test_register_must_be_whole_blocks() {
        let engine = ModeEngine::<TdesEde3>::new(&[0x01u8; 24], CfbSegment::Byte).unwrap();
        assert!(matches!(
            engine.encrypt(CipherMode::Ofb, &[0u8; 12], &[0u8; 8]),
            Err(CipherError::InvalidRegister { mode: CipherMode::Ofb, len: 12 })
        ));
        assert!(matches!(
            engine.encrypt(CipherMode::Ctr, &[0u8; 9], &[0u8; 8]),
            Err(CipherError::InvalidRegister { mode: CipherMode::Ctr, len: 9 })
        ));
    }
}
