//! Virtual SLE4442 card and reader
//!
//! Emulates an SLE4442 behind a PC/SC reader that speaks the memory card
//! pseudo-APDUs (CLA = 0xFF). Used as the transport in tests and as a
//! stand-in card when no hardware is attached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::apdu::{hexify, ins, parse_apdu, Response, APDU, CLA_READER, SW};

use super::atr;
use super::sle4442::{SELECT_SLE4442, SLE4442_INFO};
use super::state::{Sle4442Image, ERROR_COUNTER_FULL, PROTECTION_BYTES};
use super::storage::CardImageStore;
use super::transport::{ReaderBackend, Transport, TransportError};

/// Virtual SLE4442 card
pub struct Sle4442Card {
    image: Sle4442Image,
    /// Backing file, saved after every change to the image
    store: Option<CardImageStore>,
    atr: Vec<u8>,
    powered: bool,
    /// Card type selected on the reader
    selected: bool,
    psc_verified: bool,
    command_log: Vec<Vec<u8>>,
    /// Addresses whose cells ignore writes
    stuck_bytes: HashSet<usize>,
    /// Status word returned for an instruction instead of executing it
    forced_status: HashMap<u8, u16>,
}

impl Default for Sle4442Card {
    fn default() -> Self {
        Self::with_image(Sle4442Image::default())
    }
}

impl Sle4442Card {
    /// Create a blank card
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: Sle4442Image) -> Self {
        Self {
            image,
            store: None,
            atr: atr::sle4442_atr(),
            powered: false,
            selected: false,
            psc_verified: false,
            command_log: Vec::new(),
            stuck_bytes: HashSet::new(),
            forced_status: HashMap::new(),
        }
    }

    /// Card backed by an image file; a missing file gives a blank card
    pub fn from_store(mut store: CardImageStore) -> Self {
        store.load();
        let mut card = Self::with_image(store.image.clone());
        card.store = Some(store);
        card
    }

    pub fn image(&self) -> &Sle4442Image {
        &self.image
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Every command received since power on, as raw bytes
    pub fn command_log(&self) -> &[Vec<u8>] {
        &self.command_log
    }

    pub fn clear_command_log(&mut self) {
        self.command_log.clear();
    }

    /// Make writes to `address` silently leave the cell unchanged
    pub fn stick_byte(&mut self, address: usize) {
        self.stuck_bytes.insert(address);
    }

    /// Answer every command with instruction `ins` with `sw`
    pub fn force_status(&mut self, ins: u8, sw: u16) {
        self.forced_status.insert(ins, sw);
    }

    pub fn clear_faults(&mut self) {
        self.stuck_bytes.clear();
        self.forced_status.clear();
    }

    /// Power on the card
    pub fn power_on(&mut self) -> Vec<u8> {
        self.powered = true;
        self.selected = false;
        self.psc_verified = false;
        info!("Virtual SLE4442 powered on");
        self.atr.clone()
    }

    /// Power off the card
    pub fn power_off(&mut self) {
        self.powered = false;
        self.selected = false;
        self.psc_verified = false;
        info!("Virtual SLE4442 powered off");
    }

    /// Process a command, returning data followed by SW1 SW2
    pub fn process_apdu(&mut self, apdu_bytes: &[u8]) -> Vec<u8> {
        if !self.powered {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED).to_bytes();
        }
        self.command_log.push(apdu_bytes.to_vec());

        let cmd = match parse_apdu(apdu_bytes) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("Failed to parse APDU: {}", e);
                return Response::error(SW::WRONG_LENGTH).to_bytes();
            }
        };

        debug!(
            "Processing APDU: CLA={:02X} INS={:02X} P1={:02X} P2={:02X}",
            cmd.cla, cmd.ins, cmd.p1, cmd.p2
        );

        if let Some(sw) = self.forced_status.get(&cmd.ins) {
            debug!("Forced status {:04X} for INS {:02X}", sw, cmd.ins);
            return Response::error(*sw).to_bytes();
        }

        if cmd.cla != CLA_READER {
            return Response::error(SW::CLA_NOT_SUPPORTED).to_bytes();
        }

        if cmd.ins == ins::SELECT_CARD_TYPE {
            return self.handle_select(&cmd).to_bytes();
        }
        if !self.selected {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED).to_bytes();
        }

        let response = match cmd.ins {
            ins::READ_MEMORY => self.handle_read(&cmd),
            ins::PRESENT_CODE => self.handle_present_code(&cmd),
            ins::WRITE_MEMORY => self.handle_write(&cmd),
            ins::CHANGE_CODE => self.handle_change_code(&cmd),
            ins::READ_PROTECTION_BITS => self.handle_read_protection(&cmd),
            ins::WRITE_PROTECTION => self.handle_write_protection(&cmd),
            _ => Response::error(SW::INS_NOT_SUPPORTED),
        };
        response.to_bytes()
    }

    fn handle_select(&mut self, cmd: &APDU) -> Response {
        if cmd.p1 != 0x00 || cmd.p2 != 0x00 {
            return Response::error(SW::INCORRECT_P1_P2);
        }
        if cmd.data != [SELECT_SLE4442] {
            debug!("Unsupported card type selector: {}", hexify(&cmd.data));
            return Response::error(SW::WRONG_DATA);
        }
        self.selected = true;
        Response::ok()
    }

    /// Range of main memory addressed by P2 and `len`
    fn memory_range(cmd: &APDU, len: usize) -> Option<std::ops::Range<usize>> {
        let start = cmd.p2 as usize;
        let end = start + len;
        (cmd.p1 == 0x00 && len > 0 && end <= SLE4442_INFO.capacity).then_some(start..end)
    }

    fn handle_read(&self, cmd: &APDU) -> Response {
        let Some(le) = cmd.le else {
            return Response::error(SW::WRONG_LENGTH);
        };
        match Self::memory_range(cmd, le as usize) {
            Some(range) => Response::success(self.image.memory[range].to_vec()),
            None => Response::error(SW::INCORRECT_P1_P2),
        }
    }

    fn handle_present_code(&mut self, cmd: &APDU) -> Response {
        if cmd.data.len() != SLE4442_INFO.pin_len {
            return Response::error(SW::WRONG_LENGTH);
        }
        if self.image.is_locked() {
            return Response::error(SW::AUTH_METHOD_BLOCKED);
        }

        if cmd.data == self.image.psc {
            self.image.error_counter = ERROR_COUNTER_FULL;
            self.psc_verified = true;
            info!("Virtual SLE4442: PSC accepted");
        } else {
            self.image.consume_attempt();
            self.psc_verified = false;
            warn!(
                "Virtual SLE4442: wrong PSC, error counter {:02X}",
                self.image.error_counter
            );
        }
        self.persist();
        Response::new(Vec::new(), SW::code_counter(self.image.error_counter))
    }

    fn handle_write(&mut self, cmd: &APDU) -> Response {
        if !self.psc_verified {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }
        let Some(range) = Self::memory_range(cmd, cmd.data.len()) else {
            return Response::error(SW::INCORRECT_P1_P2);
        };

        for (address, value) in range.zip(&cmd.data) {
            if self.stuck_bytes.contains(&address) || self.image.is_protected(address) {
                continue;
            }
            self.image.memory[address] = *value;
        }
        self.persist();
        Response::ok()
    }

    fn handle_change_code(&mut self, cmd: &APDU) -> Response {
        if cmd.p1 != 0x00 || cmd.p2 != 0x01 {
            return Response::error(SW::INCORRECT_P1_P2);
        }
        if cmd.data.len() != SLE4442_INFO.pin_len {
            return Response::error(SW::WRONG_LENGTH);
        }
        if !self.psc_verified {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }
        self.image.psc = cmd.data.clone();
        self.persist();
        info!("Virtual SLE4442: PSC changed");
        Response::ok()
    }

    fn handle_read_protection(&self, cmd: &APDU) -> Response {
        if cmd.le != Some(PROTECTION_BYTES as u32) {
            return Response::error(SW::WRONG_LENGTH);
        }
        Response::success(self.image.protection.clone())
    }

    /// Protect each byte whose stored value equals the supplied one
    fn handle_write_protection(&mut self, cmd: &APDU) -> Response {
        if !self.psc_verified {
            return Response::error(SW::SECURITY_STATUS_NOT_SATISFIED);
        }
        let area_end = PROTECTION_BYTES * 8;
        let start = cmd.p2 as usize;
        if cmd.p1 != 0x00 || cmd.data.is_empty() || start + cmd.data.len() > area_end {
            return Response::error(SW::INCORRECT_P1_P2);
        }

        for (address, value) in (start..).zip(&cmd.data) {
            if self.image.memory[address] == *value {
                self.image.protect(address);
            }
        }
        self.persist();
        Response::ok()
    }

    fn persist(&mut self) {
        if let Some(store) = self.store.as_mut() {
            store.image = self.image.clone();
            if !store.save() {
                warn!("Virtual SLE4442: image not saved");
            }
        }
    }
}

/// A virtual card shared between a reader and its connections
pub type SharedCard = Arc<Mutex<Sle4442Card>>;

/// Reader backend over named virtual cards
#[derive(Default, Clone)]
pub struct VirtualReader {
    slots: Vec<(String, Option<SharedCard>)>,
}

impl VirtualReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reader holding `card`, returning the shared handle
    pub fn insert(&mut self, reader: &str, card: Sle4442Card) -> SharedCard {
        let card = Arc::new(Mutex::new(card));
        self.slots.retain(|(name, _)| name != reader);
        self.slots.push((reader.to_string(), Some(card.clone())));
        card
    }

    /// Add a reader with no card in it
    pub fn add_empty(&mut self, reader: &str) {
        self.slots.retain(|(name, _)| name != reader);
        self.slots.push((reader.to_string(), None));
    }
}

impl ReaderBackend for VirtualReader {
    fn readers(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.slots.iter().map(|(name, _)| name.clone()).collect())
    }

    fn connect(&self, reader: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (_, slot) = self
            .slots
            .iter()
            .find(|(name, _)| name == reader)
            .ok_or_else(|| TransportError::ReaderNotFound(reader.to_string()))?;
        let card = slot.clone().ok_or_else(|| TransportError::NoCard(reader.to_string()))?;

        let atr = card.lock().power_on();
        Ok(Box::new(VirtualConnection {
            card: Some(card),
            atr,
        }))
    }
}

/// Open connection to a virtual card
pub struct VirtualConnection {
    card: Option<SharedCard>,
    atr: Vec<u8>,
}

impl Transport for VirtualConnection {
    fn transmit(&mut self, command: &[u8]) -> Result<Response, TransportError> {
        let card = self.card.as_ref().ok_or(TransportError::Closed)?;
        let raw = card.lock().process_apdu(command);
        Ok(Response::from_bytes(&raw)?)
    }

    fn atr(&self) -> Vec<u8> {
        self.atr.clone()
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        match self.card.take() {
            Some(card) => {
                card.lock().power_off();
                Ok(())
            }
            None => Err(TransportError::Closed),
        }
    }
}
