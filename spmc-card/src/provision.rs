//! Seed phrase provisioning
//!
//! Glue between the mnemonic, cipher, record and card layers: write an
//! encrypted seed phrase to a card, read the record back, and decrypt it.

use log::info;
use zeroize::Zeroizing;

use crate::card::{CardSession, ReaderBackend, SessionError};
use crate::config::Config;
use crate::crypto::{derive_key, CipherSession};
use crate::error::Result;
use crate::markup::{FormatVersion, MarkupCodec, MarkupRecord};
use crate::mnemonic::{entropy_to_phrase, expected_plain_len, phrase_to_entropy};

/// Encrypt `phrase` with a key derived from `password` and write the
/// record to the start of the card
///
/// The session must be connected with the PIN verified. Everything is
/// validated and encoded before the first byte goes to the card.
pub fn write_seed_phrase<B: ReaderBackend>(
    session: &mut CardSession<B>,
    phrase: &str,
    algorithm: &str,
    password: &str,
    contact_data: &str,
    config: &Config,
) -> Result<MarkupRecord> {
    let card_type = session.card_type().ok_or(SessionError::NoCardTypeSelected)?;
    let (word_count, entropy) = phrase_to_entropy(phrase)?;

    let key = derive_key(password, algorithm, config.kdf_iterations)?;
    let cipher = CipherSession::new(algorithm, &key, None)?;
    let encrypted_seed = cipher.encrypt(&entropy)?;

    let record = MarkupRecord {
        card_type: card_type.name.to_string(),
        contact_data: contact_data.to_string(),
        format_version: FormatVersion::CURRENT,
        algorithm: algorithm.to_string(),
        word_count,
        encrypted_seed,
        iv: cipher.iv().to_vec(),
    };
    let bytes = MarkupCodec::new().encode(&record)?;

    session.write(0, &bytes)?;
    info!("Wrote {}-word seed with {} ({} bytes)", word_count, algorithm, bytes.len());
    Ok(record)
}

/// Read the whole card and decode the record at its start
pub fn read_markup<B: ReaderBackend>(session: &mut CardSession<B>) -> Result<MarkupRecord> {
    let card_type = session.card_type().ok_or(SessionError::NoCardTypeSelected)?;
    let bytes = session.read(0, card_type.info.capacity)?;
    Ok(MarkupCodec::new().decode(&bytes)?)
}

/// Decrypt the seed in `record` and return it as a phrase
///
/// A wrong password is not detected here: it yields a different, valid
/// looking phrase.
pub fn recover_seed_phrase(
    record: &MarkupRecord,
    password: &str,
    config: &Config,
) -> Result<Zeroizing<String>> {
    let key = derive_key(password, &record.algorithm, config.kdf_iterations)?;
    let cipher = CipherSession::new(&record.algorithm, &key, Some(record.iv.as_slice()))?;

    let plain_len = expected_plain_len(record.word_count)?;
    let entropy = Zeroizing::new(cipher.decrypt(&record.encrypted_seed, Some(plain_len))?);
    Ok(entropy_to_phrase(&entropy)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{SharedCard, Sle4442Card, VirtualReader};
    use crate::error::Error;
    use crate::markup::MarkupError;
    use crate::mnemonic::MnemonicError;
    use std::path::PathBuf;

    const READER: &str = "Virtual Reader 0";
    const PSC: [u8; 3] = [0xFF, 0xFF, 0xFF];
    const PHRASE_12: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";
    const PHRASE_24: &str = concat!(
        "letter advice cage absurd amount doctor acoustic avoid ",
        "letter advice cage absurd amount doctor acoustic avoid ",
        "letter advice cage absurd amount doctor acoustic bless",
    );

    fn test_config() -> Config {
        Config {
            kdf_iterations: 16,
            card_dir: PathBuf::from("unused"),
        }
    }

    fn reader_with_card() -> (VirtualReader, SharedCard) {
        let mut reader = VirtualReader::new();
        let card = reader.insert(READER, Sle4442Card::new());
        (reader, card)
    }

    fn connected(reader: &VirtualReader) -> CardSession<&VirtualReader> {
        let mut session = CardSession::new(reader);
        session.select_reader(READER).unwrap();
        session.select_card_type("sle4442").unwrap();
        session.connect().unwrap();
        session
    }

    #[test]
    fn test_write_read_recover() {
        let config = test_config();
        for (phrase, algorithm) in [
            (PHRASE_12, "AES-256_CBC"),
            (PHRASE_24, "GOST_34_13_64_CFB"),
            (PHRASE_24, "GOST_34_13_128_CBC"),
            (PHRASE_12, "3DES_ECB"),
        ] {
            let (reader, card) = reader_with_card();
            let mut session = connected(&reader);
            session.verify_pin(&PSC).unwrap();

            let written = write_seed_phrase(
                &mut session,
                phrase,
                algorithm,
                "hunter2",
                "Alice",
                &config,
            )
            .unwrap();
            let encoded = MarkupCodec::new().encode(&written).unwrap();
            assert_eq!(&card.lock().image().memory[..encoded.len()], &encoded[..]);

            let record = read_markup(&mut session).unwrap();
            assert_eq!(record, written);
            assert_eq!(record.contact_data, "Alice");

            let recovered = recover_seed_phrase(&record, "hunter2", &config).unwrap();
            assert_eq!(recovered.as_str(), phrase);
        }
    }

    #[test]
    fn test_wrong_password_gives_other_phrase() {
        let config = test_config();
        let (reader, _card) = reader_with_card();
        let mut session = connected(&reader);
        session.verify_pin(&PSC).unwrap();

        let algorithm = "AES-256_CTR";
        let record =
            write_seed_phrase(&mut session, PHRASE_12, algorithm, "right", "", &config).unwrap();
        let recovered = recover_seed_phrase(&record, "wrong", &config).unwrap();
        assert_ne!(recovered.as_str(), PHRASE_12);
    }

    #[test]
    fn test_kdf_rounds_must_match() {
        let (reader, _card) = reader_with_card();
        let mut session = connected(&reader);
        session.verify_pin(&PSC).unwrap();

        let config = test_config();
        let record =
            write_seed_phrase(&mut session, PHRASE_12, "AES-256_OFB", "pw", "", &config).unwrap();
        let other = Config {
            kdf_iterations: 17,
            ..config
        };
        assert_ne!(recover_seed_phrase(&record, "pw", &other).unwrap().as_str(), PHRASE_12);
    }

    #[test]
    fn test_write_needs_pin() {
        let (reader, card) = reader_with_card();
        let mut session = connected(&reader);
        card.lock().clear_command_log();

        let config = test_config();
        let result = write_seed_phrase(&mut session, PHRASE_12, "AES-256_CBC", "pw", "", &config);
        assert_eq!(result, Err(Error::Session(SessionError::PinNotVerified)));
        assert!(card.lock().command_log().is_empty());
    }

    #[test]
    fn test_invalid_input_sends_nothing() {
        let config = test_config();
        let (reader, card) = reader_with_card();
        let mut session = connected(&reader);
        session.verify_pin(&PSC).unwrap();
        card.lock().clear_command_log();

        let result =
            write_seed_phrase(&mut session, "not a mnemonic", "AES-256_CBC", "pw", "", &config);
        assert!(matches!(result, Err(Error::Mnemonic(MnemonicError::InvalidMnemonic(_)))));

        let result = write_seed_phrase(&mut session, PHRASE_12, "BLOWFISH_CBC", "pw", "", &config);
        assert!(matches!(result, Err(Error::Catalog(_))));

        let contact = "a contact far too long";
        let result =
            write_seed_phrase(&mut session, PHRASE_12, "AES-256_CBC", "pw", contact, &config);
        assert!(matches!(result, Err(Error::Markup(MarkupError::ContactDataTooLong { .. }))));

        assert!(card.lock().command_log().is_empty());
    }

    #[test]
    fn test_blank_card_is_not_markup() {
        let (reader, _card) = reader_with_card();
        let mut session = connected(&reader);
        assert_eq!(read_markup(&mut session), Err(Error::Markup(MarkupError::CardIsNotMarkup)));
    }

    #[test]
    fn test_scoped_provisioning() {
        let config = test_config();
        let (reader, card) = reader_with_card();
        let mut session = CardSession::new(&reader);
        session.select_reader(READER).unwrap();
        session.select_card_type("sle4442").unwrap();

        session
            .scoped(|s| -> Result<()> {
                s.verify_pin(&PSC)?;
                write_seed_phrase(s, PHRASE_12, "GOST_34_13_128_CTR", "pw", "Bob", &config)?;
                Ok(())
            })
            .unwrap();
        assert!(!card.lock().is_powered());

        let record = session.scoped(|s| read_markup(s)).unwrap();
        assert_eq!(record.algorithm, "GOST_34_13_128_CTR");
        assert_eq!(recover_seed_phrase(&record, "pw", &config).unwrap().as_str(), PHRASE_12);
    }
}
