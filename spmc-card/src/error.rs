//! Crate-level error type

use thiserror::Error;

use crate::card::SessionError;
use crate::crypto::{CatalogError, CipherError};
use crate::markup::MarkupError;
use crate::mnemonic::MnemonicError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),
}

pub type Result<T> = std::result::Result<T, Error>;
