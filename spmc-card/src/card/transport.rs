//! Reader transport abstraction
//!
//! A [`ReaderBackend`] discovers readers and opens connections; a
//! [`Transport`] exchanges raw APDUs with the card in one reader. PC/SC
//! or any other stack plugs in here; the crate ships a virtual SLE4442
//! backend for tests and emulation.

use thiserror::Error;

use crate::apdu::{APDUError, Response};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    #[error("No card present in reader {0}")]
    NoCard(String),

    #[error("Connection closed")]
    Closed,

    #[error("Malformed exchange: {0}")]
    Apdu(#[from] APDUError),

    #[error("Reader backend error: {0}")]
    Backend(String),
}

/// An open connection to a card
pub trait Transport: Send {
    /// Send one encoded command and wait for its response
    fn transmit(&mut self, command: &[u8]) -> Result<Response, TransportError>;

    /// Answer-to-reset reported when the connection was opened
    fn atr(&self) -> Vec<u8>;

    /// Power down and release the reader
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Reader discovery and connection
pub trait ReaderBackend {
    fn readers(&self) -> Result<Vec<String>, TransportError>;

    fn connect(&self, reader: &str) -> Result<Box<dyn Transport>, TransportError>;
}

impl<B: ReaderBackend + ?Sized> ReaderBackend for &B {
    fn readers(&self) -> Result<Vec<String>, TransportError> {
        (**self).readers()
    }

    fn connect(&self, reader: &str) -> Result<Box<dyn Transport>, TransportError> {
        (**self).connect(reader)
    }
}
