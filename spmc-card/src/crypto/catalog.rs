//! Symmetric algorithm catalog
//!
//! Static table of every cipher a card record may reference. The 2-byte
//! wire id is what the record stores; the name is what callers present.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Catalog lookup errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown encryption algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Unknown card type: {0}")]
    UnknownCardType(String),
}

/// Block cipher family behind an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherFamily {
    /// GOST R 34.12-2015 128-bit block cipher
    Kuznyechik,
    /// GOST R 34.12-2015 64-bit block cipher
    Magma,
    /// Triple DES (EDE, three keys)
    TripleDes,
    /// AES with a 256-bit key
    Aes256,
}

/// Mode of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Ecb,
    Ctr,
    Ofb,
    Cbc,
    Cfb,
}

impl CipherMode {
    /// Modes that only accept whole blocks (and therefore pad on encrypt)
    pub fn is_block_aligned(self) -> bool {
        matches!(self, CipherMode::Ecb | CipherMode::Cbc)
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CipherMode::Ecb => "ECB",
            CipherMode::Ctr => "CTR",
            CipherMode::Ofb => "OFB",
            CipherMode::Cbc => "CBC",
            CipherMode::Cfb => "CFB",
        };
        f.write_str(name)
    }
}

/// Structural parameters of one algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmDescriptor {
    pub name: &'static str,
    pub family: CipherFamily,
    pub mode: CipherMode,
    /// Key length in bytes
    pub key_len: usize,
    /// Block length in bytes
    pub block_len: usize,
    /// IV (register) length in bytes, 0 when the mode takes none
    pub iv_size: usize,
    pub wire_id: [u8; 2],
}

macro_rules! algorithm {
    (
        $name:literal,
        $family:ident,
        $mode:ident,
        $key:literal,
        $block:literal,
        $iv:literal,
        [$hi:literal, $lo:literal]
    ) => {
        AlgorithmDescriptor {
            name: $name,
            family: CipherFamily::$family,
            mode: CipherMode::$mode,
            key_len: $key,
            block_len: $block,
            iv_size: $iv,
            wire_id: [$hi, $lo],
        }
    };
}

/// All supported algorithms, in menu order
pub static ALGORITHMS: &[AlgorithmDescriptor] = &[
    algorithm!("GOST_34_13_128_ECB", Kuznyechik, Ecb, 32, 16, 0, [0x00, 0x01]),
    algorithm!("GOST_34_13_128_CTR", Kuznyechik, Ctr, 32, 16, 8, [0x00, 0x02]),
    algorithm!("GOST_34_13_128_OFB", Kuznyechik, Ofb, 32, 16, 32, [0x00, 0x03]),
    algorithm!("GOST_34_13_128_CBC", Kuznyechik, Cbc, 32, 16, 32, [0x00, 0x04]),
    algorithm!("GOST_34_13_128_CFB", Kuznyechik, Cfb, 32, 16, 32, [0x00, 0x05]),
    algorithm!("GOST_34_13_64_ECB", Magma, Ecb, 32, 8, 0, [0x00, 0x81]),
    algorithm!("GOST_34_13_64_CTR", Magma, Ctr, 32, 8, 4, [0x00, 0x82]),
    algorithm!("GOST_34_13_64_OFB", Magma, Ofb, 32, 8, 16, [0x00, 0x83]),
    algorithm!("GOST_34_13_64_CBC", Magma, Cbc, 32, 8, 24, [0x00, 0x84]),
    algorithm!("GOST_34_13_64_CFB", Magma, Cfb, 32, 8, 16, [0x00, 0x85]),
    algorithm!("3DES_ECB", TripleDes, Ecb, 24, 8, 0, [0x80, 0x81]),
    algorithm!("3DES_CTR", TripleDes, Ctr, 24, 8, 4, [0x80, 0x82]),
    algorithm!("3DES_OFB", TripleDes, Ofb, 24, 8, 8, [0x80, 0x83]),
    algorithm!("3DES_CBC", TripleDes, Cbc, 24, 8, 8, [0x80, 0x84]),
    algorithm!("3DES_CFB", TripleDes, Cfb, 24, 8, 8, [0x80, 0x85]),
    algorithm!("AES-256_ECB", Aes256, Ecb, 32, 16, 0, [0x81, 0x01]),
    algorithm!("AES-256_CTR", Aes256, Ctr, 32, 16, 8, [0x81, 0x02]),
    algorithm!("AES-256_OFB", Aes256, Ofb, 32, 16, 16, [0x81, 0x03]),
    algorithm!("AES-256_CBC", Aes256, Cbc, 32, 16, 16, [0x81, 0x04]),
    algorithm!("AES-256_CFB", Aes256, Cfb, 32, 16, 16, [0x81, 0x05]),
];

static BY_NAME: Lazy<HashMap<&'static str, &'static AlgorithmDescriptor>> =
    Lazy::new(|| ALGORITHMS.iter().map(|alg| (alg.name, alg)).collect());

static BY_WIRE_ID: Lazy<HashMap<[u8; 2], &'static str>> =
    Lazy::new(|| ALGORITHMS.iter().map(|alg| (alg.wire_id, alg.name)).collect());

/// Look up an algorithm by name
pub fn describe(name: &str) -> Result<&'static AlgorithmDescriptor, CatalogError> {
    BY_NAME
        .get(name)
        .copied()
        .ok_or_else(|| CatalogError::UnknownAlgorithm(name.to_string()))
}

/// Map a record wire id back to the algorithm name
pub fn resolve_wire_id(id: [u8; 2]) -> Result<&'static str, CatalogError> {
    BY_WIRE_ID
        .get(&id)
        .copied()
        .ok_or_else(|| CatalogError::UnknownAlgorithm(format!("0x{:02X}{:02X}", id[0], id[1])))
}

/// Algorithm names in table order
pub fn list_names() -> Vec<&'static str> {
    ALGORITHMS.iter().map(|alg| alg.name).collect()
}
