//! Cipher session
//!
//! Binds an algorithm, a key and an IV, and applies the padding rules the
//! card record relies on: block-aligned modes are zero padded on encrypt,
//! and decrypt truncates to a length the caller already knows.

use std::fmt;

use log::debug;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::catalog::{self, AlgorithmDescriptor};
use super::provider::{provider_for, BlockCipherProvider};
use super::CipherError;

pub struct CipherSession {
    descriptor: &'static AlgorithmDescriptor,
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    provider: Box<dyn BlockCipherProvider>,
}

impl CipherSession {
    /// Create a session for `algorithm`.
    ///
    /// When no IV is given and the algorithm needs one, a random IV is
    /// generated. Callers must store it (see [`CipherSession::iv`]); it
    /// cannot be recovered from the key.
    pub fn new(algorithm: &str, key: &[u8], iv: Option<&[u8]>) -> Result<Self, CipherError> {
        let descriptor = catalog::describe(algorithm)?;
        Self::with_provider(descriptor, key, iv, provider_for(descriptor.family))
    }

    /// Create a session with an explicit block cipher provider
    pub fn with_provider(
        descriptor: &'static AlgorithmDescriptor,
        key: &[u8],
        iv: Option<&[u8]>,
        provider: Box<dyn BlockCipherProvider>,
    ) -> Result<Self, CipherError> {
        if key.len() != descriptor.key_len {
            return Err(CipherError::WrongKeyLength {
                expected: descriptor.key_len,
                actual: key.len(),
            });
        }

        // An empty IV counts as "not given"
        let iv = match iv.filter(|iv| !iv.is_empty()) {
            Some(iv) if iv.len() != descriptor.iv_size => {
                return Err(CipherError::WrongIVLength {
                    expected: descriptor.iv_size,
                    actual: iv.len(),
                });
            }
            Some(iv) => iv.to_vec(),
            None => {
                let mut iv = vec![0u8; descriptor.iv_size];
                OsRng.fill_bytes(&mut iv);
                if !iv.is_empty() {
                    debug!("Generated {}-byte IV for {}", iv.len(), descriptor.name);
                }
                iv
            }
        };

        Ok(Self {
            descriptor,
            key: Zeroizing::new(key.to_vec()),
            iv,
            provider,
        })
    }

    pub fn descriptor(&self) -> &'static AlgorithmDescriptor {
        self.descriptor
    }

    /// The IV in use (empty for modes without one)
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Encrypt, zero padding to a whole number of blocks for ECB/CBC
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let block_len = self.descriptor.block_len;
        if self.descriptor.mode.is_block_aligned() && plaintext.len() % block_len != 0 {
            let mut padded = Zeroizing::new(plaintext.to_vec());
            padded.resize(plaintext.len().next_multiple_of(block_len), 0);
            return self.transform(&padded, true);
        }
        self.transform(plaintext, true)
    }

    /// Decrypt, then cut the result to `plaintext_len` if given
    ///
    /// Padding is never inspected: the true length must come from the
    /// caller (for seeds, from the word count).
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        plaintext_len: Option<usize>,
    ) -> Result<Vec<u8>, CipherError> {
        let mut plaintext = self.transform(ciphertext, false)?;
        if let Some(len) = plaintext_len {
            plaintext.truncate(len);
        }
        Ok(plaintext)
    }

    fn transform(&self, data: &[u8], encrypt: bool) -> Result<Vec<u8>, CipherError> {
        let mode = self.descriptor.mode;
        if encrypt {
            self.provider.encrypt(mode, &self.key, &self.iv, data)
        } else {
            self.provider.decrypt(mode, &self.key, &self.iv, data)
        }
    }
}

impl fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSession")
            .field("algorithm", &self.descriptor.name)
            .field("iv", &self.iv)
            .finish_non_exhaustive()
    }
}
