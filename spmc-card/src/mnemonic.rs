//! BIP-39 mnemonic helpers
//!
//! Word counts map to entropy sizes as in BIP-39 (32 bits of entropy per
//! three words). The record stores counts from 3 to 24 words; only 12 and
//! above can be turned back into an English phrase.

use bip39::{Language, Mnemonic};
use thiserror::Error;
use zeroize::Zeroizing;

/// Word counts a card record may carry
pub const WORD_COUNTS: [u8; 8] = [3, 6, 9, 12, 15, 18, 21, 24];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MnemonicError {
    #[error("Invalid word count: {0}")]
    InvalidWordCount(usize),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Entropy of {0} bytes has no mnemonic encoding")]
    InvalidEntropy(usize),
}

/// Bits of entropy encoded by `word_count` words
pub fn entropy_bits(word_count: u8) -> Result<usize, MnemonicError> {
    if !WORD_COUNTS.contains(&word_count) {
        return Err(MnemonicError::InvalidWordCount(word_count as usize));
    }
    Ok(word_count as usize * 32 / 3)
}

/// Unpadded seed length in bytes for `word_count` words
pub fn expected_plain_len(word_count: u8) -> Result<usize, MnemonicError> {
    Ok(entropy_bits(word_count)? / 8)
}

/// Parse an English phrase, returning its word count and entropy
pub fn phrase_to_entropy(phrase: &str) -> Result<(u8, Zeroizing<Vec<u8>>), MnemonicError> {
    let mnemonic = Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;

    let word_count = mnemonic.word_count();
    let word_count = u8::try_from(word_count)
        .ok()
        .filter(|wc| WORD_COUNTS.contains(wc))
        .ok_or(MnemonicError::InvalidWordCount(word_count))?;

    Ok((word_count, Zeroizing::new(mnemonic.to_entropy())))
}

/// Encode entropy as an English phrase
pub fn entropy_to_phrase(entropy: &[u8]) -> Result<Zeroizing<String>, MnemonicError> {
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|_| MnemonicError::InvalidEntropy(entropy.len()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-39 reference vector
    const ABANDON_12: &str = concat!(
        "abandon abandon abandon abandon abandon abandon ",
        "abandon abandon abandon abandon abandon about",
    );

    #[test]
    fn test_entropy_bits() {
        assert_eq!(entropy_bits(3).unwrap(), 32);
        assert_eq!(entropy_bits(12).unwrap(), 128);
        assert_eq!(entropy_bits(24).unwrap(), 256);
        assert_eq!(entropy_bits(13), Err(MnemonicError::InvalidWordCount(13)));
        assert_eq!(entropy_bits(0), Err(MnemonicError::InvalidWordCount(0)));
    }

    #[test]
    fn test_expected_plain_len() {
        let lens: Vec<usize> = WORD_COUNTS
            .iter()
            .map(|wc| expected_plain_len(*wc).unwrap())
            .collect();
        assert_eq!(lens, vec![4, 8, 12, 16, 20, 24, 28, 32]);
    }

    #[test]
    fn test_phrase_to_entropy() {
        let (word_count, entropy) = phrase_to_entropy(ABANDON_12).unwrap();
        assert_eq!(word_count, 12);
        assert_eq!(entropy.as_slice(), &[0u8; 16]);
    }

    #[test]
    fn test_entropy_to_phrase() {
        let phrase = entropy_to_phrase(&[0u8; 16]).unwrap();
        assert_eq!(phrase.as_str(), ABANDON_12);

        let entropy = hex::decode("7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f").unwrap();
        let phrase = entropy_to_phrase(&entropy).unwrap();
        assert_eq!(
            phrase.as_str(),
            "legal winner thank year wave sausage worth useful legal winner thank yellow"
        );
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let phrase = ABANDON_12.replace("about", "abandon");
        assert!(matches!(
            phrase_to_entropy(&phrase),
            Err(MnemonicError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_short_entropy_has_no_phrase() {
        assert_eq!(entropy_to_phrase(&[0u8; 4]), Err(MnemonicError::InvalidEntropy(4)));
    }
}
