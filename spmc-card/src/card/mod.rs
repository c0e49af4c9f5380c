//! Memory card access
//!
//! Card type catalog and command builders, the session state machine that
//! drives a reader, and a virtual SLE4442 that stands in for hardware.

pub mod atr;
pub mod session;
pub mod sle4442;
pub mod state;
pub mod storage;
pub mod transport;
pub mod types;
pub mod virtual_card;

pub use session::{CardSession, FailureReason, SessionError, SessionState};
pub use state::Sle4442Image;
pub use storage::CardImageStore;
pub use transport::{ReaderBackend, Transport, TransportError};
pub use types::{
    card_type, card_type_names, resolve_card_type, CardCommands, CardInfo, CardType, CommandError,
    Operation,
};
pub use virtual_card::{SharedCard, Sle4442Card, VirtualReader};
