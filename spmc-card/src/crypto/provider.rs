//! Block cipher providers
//!
//! One provider per cipher family. Each keys the RustCrypto primitive and
//! hands the data to the shared mode engine.

use aes::Aes256;
use des::TdesEde3;
use kuznyechik::Kuznyechik;
use magma::Magma;

use super::catalog::{CipherFamily, CipherMode};
use super::modes::{CfbSegment, ModeEngine};
use super::CipherError;

/// Raw transform over one cipher family
pub trait BlockCipherProvider: Send + Sync {
    /// Family this provider implements
    fn family(&self) -> CipherFamily;

    fn encrypt(
        &self,
        mode: CipherMode,
        key: &[u8],
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CipherError>;

    fn decrypt(
        &self,
        mode: CipherMode,
        key: &[u8],
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CipherError>;
}

/// GOST R 34.12-2015 "Kuznyechik" (128-bit block)
pub struct KuznyechikProvider;

/// GOST R 34.12-2015 "Magma" (64-bit block)
pub struct MagmaProvider;

/// Triple DES EDE3
pub struct TripleDesProvider;

/// AES-256
pub struct Aes256Provider;

macro_rules! impl_provider {
    ($provider:ty, $cipher:ty, $family:ident, $segment:ident) => {
        impl BlockCipherProvider for $provider {
            fn family(&self) -> CipherFamily {
                CipherFamily::$family
            }

            fn encrypt(
                &self,
                mode: CipherMode,
                key: &[u8],
                iv: &[u8],
                data: &[u8],
            ) -> Result<Vec<u8>, CipherError> {
                ModeEngine::<$cipher>::new(key, CfbSegment::$segment)?.encrypt(mode, iv, data)
            }

            fn decrypt(
                &self,
                mode: CipherMode,
                key: &[u8],
                iv: &[u8],
                data: &[u8],
            ) -> Result<Vec<u8>, CipherError> {
                ModeEngine::<$cipher>::new(key, CfbSegment::$segment)?.decrypt(mode, iv, data)
            }
        }
    };
}

impl_provider!(KuznyechikProvider, Kuznyechik, Kuznyechik, FullBlock);
impl_provider!(MagmaProvider, Magma, Magma, FullBlock);
impl_provider!(TripleDesProvider, TdesEde3, TripleDes, Byte);
impl_provider!(Aes256Provider, Aes256, Aes256, Byte);

/// Default provider for a family
pub fn provider_for(family: CipherFamily) -> Box<dyn BlockCipherProvider> {
    match family {
        CipherFamily::Kuznyechik => Box::new(KuznyechikProvider),
        CipherFamily::Magma => Box::new(MagmaProvider),
        CipherFamily::TripleDes => Box::new(TripleDesProvider),
        CipherFamily::Aes256 => Box::new(Aes256Provider),
    }
}
