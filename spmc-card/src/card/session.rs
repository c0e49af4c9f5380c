//! Card session state machine
//!
//! A [`CardSession`] owns one reader connection at a time and walks it
//! through `Disconnected -> Connected -> PinVerified`. Every operation
//! checks the session state before anything is sent to the card, and every
//! command answer must carry the status word the card type declares as
//! success for that operation.

use std::fmt;

use log::{debug, info, warn};
use thiserror::Error;

use crate::apdu::{hexify, Response, APDU};
use crate::crypto::CatalogError;

use super::transport::{ReaderBackend, Transport, TransportError};
use super::types::{card_type, card_type_names, CardType, CommandError, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    PinVerified,
}

/// Why a command sequence was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The card answered with a status word other than the success code
    Status(u16),
    /// Data read back after a write differs from what was written
    ReadBackMismatch,
    /// The card returned a different amount of data than requested
    UnexpectedLength { expected: usize, actual: usize },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status(sw) => write!(f, "status word {:04X}", sw),
            FailureReason::ReadBackMismatch => f.write_str("read-back differs from written data"),
            FailureReason::UnexpectedLength { expected, actual } => {
                write!(f, "expected {} bytes, card returned {}", expected, actual)
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No card readers found")]
    NoCardReaders,

    #[error("No such reader: {0}")]
    NoSuchReader(String),

    #[error("No card reader selected")]
    NoReaderSelected,

    #[error("Connection to {0} is already active")]
    ConnectionAlreadyActive(String),

    #[error("Connection is not active")]
    ConnectionNotActive,

    #[error("No card type selected")]
    NoCardTypeSelected,

    #[error("PIN is not verified")]
    PinNotVerified,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Command {operation} failed: {reason}")]
    CommandFailed {
        operation: Operation,
        reason: FailureReason,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One reader, one card, one connection
pub struct CardSession<B: ReaderBackend> {
    backend: B,
    reader: Option<String>,
    card_type: Option<&'static CardType>,
    connection: Option<Box<dyn Transport>>,
    pin_verified: bool,
}

impl<B: ReaderBackend> CardSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            reader: None,
            card_type: None,
            connection: None,
            pin_verified: false,
        }
    }

    /// Names of the readers currently attached
    pub fn readers(&self) -> Result<Vec<String>, SessionError> {
        let readers = self.backend.readers()?;
        if readers.is_empty() {
            return Err(SessionError::NoCardReaders);
        }
        Ok(readers)
    }

    pub fn select_reader(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_disconnected()?;
        if !self.readers()?.iter().any(|r| r == name) {
            return Err(SessionError::NoSuchReader(name.to_string()));
        }
        self.reader = Some(name.to_string());
        info!("Selected reader {}", name);
        Ok(())
    }

    pub fn reader(&self) -> Option<&str> {
        self.reader.as_deref()
    }

    /// Card type names that can be selected
    pub fn card_types(&self) -> Vec<&'static str> {
        card_type_names()
    }

    pub fn select_card_type(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_disconnected()?;
        self.card_type = Some(card_type(name)?);
        info!("Selected card type {}", name);
        Ok(())
    }

    pub fn card_type(&self) -> Option<&'static CardType> {
        self.card_type
    }

    pub fn state(&self) -> SessionState {
        match (&self.connection, self.pin_verified) {
            (None, _) => SessionState::Disconnected,
            (Some(_), false) => SessionState::Connected,
            (Some(_), true) => SessionState::PinVerified,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn pin_verified(&self) -> bool {
        self.connection.is_some() && self.pin_verified
    }

    /// Answer-to-reset of the connected card
    pub fn atr(&self) -> Result<Vec<u8>, SessionError> {
        self.connection
            .as_ref()
            .map(|transport| transport.atr())
            .ok_or(SessionError::ConnectionNotActive)
    }

    /// Open the selected reader and select the card type on it
    ///
    /// On failure the transport is released again and the session stays
    /// disconnected.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.ensure_disconnected()?;
        let reader = self.reader.clone().ok_or(SessionError::NoReaderSelected)?;
        let card_type = self.card_type.ok_or(SessionError::NoCardTypeSelected)?;

        let transport = self.backend.connect(&reader)?;
        let atr = transport.atr();
        debug!("ATR: {}", hexify(&atr));
        if !card_type.commands.recognizes_atr(&atr) {
            warn!("ATR {} does not look like a {} card", hexify(&atr), card_type.name);
        }
        self.connection = Some(transport);

        for apdu in card_type.commands.select_card_type() {
            if let Err(e) = self.exchange(Operation::SelectCardType, &apdu) {
                self.release();
                return Err(e);
            }
        }

        self.pin_verified = card_type.info.pin_len == 0;
        info!("Connected to {} card in {}", card_type.name, reader);
        Ok(())
    }

    /// Present the PIN to the card
    ///
    /// A PIN the card rejects also drops an earlier verification: the card
    /// forgets it on every failed attempt.
    pub fn verify_pin(&mut self, pin: &[u8]) -> Result<(), SessionError> {
        let card_type = self.active_card_type()?;
        for apdu in card_type.commands.verify_pin(pin)? {
            if let Err(e) = self.exchange(Operation::VerifyPin, &apdu) {
                self.pin_verified = card_type.info.pin_len == 0;
                return Err(e);
            }
        }
        self.pin_verified = true;
        info!("PIN verified");
        Ok(())
    }

    pub fn read(&mut self, offset: usize, size: usize) -> Result<Vec<u8>, SessionError> {
        let card_type = self.active_card_type()?;
        self.require_pin(card_type.info.read_needs_pin)?;

        let commands = card_type.commands.read(offset, size)?;
        let mut chunks = Vec::with_capacity(commands.len());
        for apdu in &commands {
            chunks.push(self.exchange(Operation::Read, apdu)?.data);
        }

        let data: Vec<u8> = chunks.into_iter().rev().flatten().collect();
        if data.len() != size {
            warn!("Read {} bytes at {}, card returned {}", size, offset, data.len());
            return Err(SessionError::CommandFailed {
                operation: Operation::Read,
                reason: FailureReason::UnexpectedLength {
                    expected: size,
                    actual: data.len(),
                },
            });
        }
        Ok(data)
    }

    /// Write `data` at `offset` and read it back
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), SessionError> {
        let card_type = self.active_card_type()?;
        self.require_pin(card_type.info.write_needs_pin)?;

        for apdu in card_type.commands.write(offset, data)? {
            self.exchange(Operation::Write, &apdu)?;
        }

        if self.read(offset, data.len())? != data {
            warn!("Read-back of {} bytes at {} does not match", data.len(), offset);
            return Err(SessionError::CommandFailed {
                operation: Operation::Write,
                reason: FailureReason::ReadBackMismatch,
            });
        }
        debug!("Wrote {} bytes at {}", data.len(), offset);
        Ok(())
    }

    pub fn change_pin(&mut self, pin: &[u8]) -> Result<(), SessionError> {
        let card_type = self.active_card_type()?;
        self.require_pin(true)?;
        for apdu in card_type.commands.change_pin(pin)? {
            self.exchange(Operation::ChangePin, &apdu)?;
        }
        info!("PIN changed");
        Ok(())
    }

    /// Protection memory, one bit per protectable byte (a cleared bit is protected)
    pub fn read_protection_bits(&mut self) -> Result<Vec<u8>, SessionError> {
        let card_type = self.active_card_type()?;
        let mut bits = Vec::new();
        for apdu in card_type.commands.read_protection_bits() {
            bits.extend(self.exchange(Operation::ReadProtection, &apdu)?.data);
        }
        Ok(bits)
    }

    /// Irreversibly protect the bytes at `offset` that currently hold `data`
    pub fn write_protection(&mut self, offset: usize, data: &[u8]) -> Result<(), SessionError> {
        let card_type = self.active_card_type()?;
        self.require_pin(true)?;
        for apdu in card_type.commands.write_protection(offset, data)? {
            self.exchange(Operation::WriteProtection, &apdu)?;
        }
        info!("Write protection applied to {} bytes at {}", data.len(), offset);
        Ok(())
    }

    /// Release the connection and forget the PIN
    ///
    /// Does nothing when no connection is open.
    pub fn disconnect(&mut self) -> Result<(), SessionError> {
        let Some(mut transport) = self.connection.take() else {
            return Ok(());
        };
        self.pin_verified = false;
        transport.disconnect()?;
        info!("Disconnected");
        Ok(())
    }

    /// Connect, run `f`, and disconnect whatever `f` returned
    pub fn scoped<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<SessionError>,
    {
        self.connect()?;
        let result = f(self);
        let closed = self.disconnect();
        let value = result?;
        closed?;
        Ok(value)
    }

    fn ensure_disconnected(&self) -> Result<(), SessionError> {
        if self.connection.is_some() {
            let reader = self.reader.clone().unwrap_or_default();
            return Err(SessionError::ConnectionAlreadyActive(reader));
        }
        Ok(())
    }

    fn active_card_type(&self) -> Result<&'static CardType, SessionError> {
        if self.connection.is_none() {
            return Err(SessionError::ConnectionNotActive);
        }
        self.card_type.ok_or(SessionError::NoCardTypeSelected)
    }

    fn require_pin(&self, needed: bool) -> Result<(), SessionError> {
        if needed && !self.pin_verified {
            return Err(SessionError::PinNotVerified);
        }
        Ok(())
    }

    /// Send one command and check its status word
    fn exchange(&mut self, operation: Operation, apdu: &APDU) -> Result<Response, SessionError> {
        let card_type = self.active_card_type()?;
        let transport = self.connection.as_mut().ok_or(SessionError::ConnectionNotActive)?;
        let command = apdu.to_bytes().map_err(TransportError::from)?;

        if matches!(operation, Operation::VerifyPin | Operation::ChangePin) {
            debug!(
                "> {} [{} bytes hidden]",
                hexify(&[apdu.cla, apdu.ins, apdu.p1, apdu.p2]),
                apdu.data.len()
            );
        } else {
            debug!("> {}", hexify(&command));
        }

        let response = transport.transmit(&command)?;
        debug!("< {:04X}", response.sw());

        let expected = card_type.info.success.for_operation(operation);
        if response.sw() != expected {
            warn!(
                "{} failed: status {:04X}, expected {:04X}",
                operation,
                response.sw(),
                expected
            );
            return Err(SessionError::CommandFailed {
                operation,
                reason: FailureReason::Status(response.sw()),
            });
        }
        Ok(response)
    }

    /// Drop the connection, logging teardown errors
    fn release(&mut self) {
        self.pin_verified = false;
        if let Some(mut transport) = self.connection.take() {
            if let Err(e) = transport.disconnect() {
                warn!("Failed to release reader: {}", e);
            }
        }
    }
}

impl<B: ReaderBackend> Drop for CardSession<B> {
    fn drop(&mut self) {
        self.release();
    }
}
