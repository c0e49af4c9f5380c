//! ATR (Answer To Reset) handling
//!
//! Synchronous memory cards answer reset with a 4-byte ISO 7816-10 header
//! instead of an asynchronous ATR. PC/SC readers wrap it as the historical
//! bytes of a minimal ATR, e.g. `3B 04 A2 13 10 91` for an SLE4442.

/// ISO 7816-10 answer-to-reset of an SLE4442
pub const SLE4442_RESET_ANSWER: [u8; 4] = [
    0xA2, // H1: protocol type S = 10 (2-wire), structure identifier
    0x13, // H2: 256 x 8 bit data units
    0x10, // H3: reserved
    0x91, // H4: reserved
];

/// Build a reader-style ATR around the given historical bytes
pub fn build_atr(historical_bytes: &[u8]) -> Vec<u8> {
    let hist_len = historical_bytes.len().min(15);
    let mut atr = Vec::with_capacity(2 + hist_len);

    // TS: direct convention
    atr.push(0x3B);
    // T0: no interface bytes, K historical bytes
    atr.push(hist_len as u8);
    atr.extend_from_slice(&historical_bytes[..hist_len]);
    atr
}

/// ATR a reader reports for an inserted SLE4442
pub fn sle4442_atr() -> Vec<u8> {
    build_atr(&SLE4442_RESET_ANSWER)
}

/// Historical bytes of an ATR, skipping any interface bytes
pub fn historical_bytes(atr: &[u8]) -> Option<&[u8]> {
    let t0 = *atr.get(1)?;
    let hist_len = (t0 & 0x0F) as usize;

    let mut pos = 2;
    let mut indicator = t0;
    loop {
        // TA/TB/TC/TD presence bits
        pos += (indicator >> 4).count_ones() as usize;
        if indicator & 0x80 == 0 {
            break;
        }
        indicator = *atr.get(pos - 1)?;
    }

    atr.get(pos..pos + hist_len)
}

/// Whether `atr` carries the SLE4442 reset answer
pub fn is_sle4442(atr: &[u8]) -> bool {
    historical_bytes(atr) == Some(&SLE4442_RESET_ANSWER[..])
}
