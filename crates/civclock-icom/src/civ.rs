//! CI-V frame encoder/decoder.
//!
//! The Icom CI-V (Communication Interface V) protocol uses binary frames on a
//! half-duplex bus. This module handles both representations the clock
//! engine needs: hex strings (how frames are built from the model table and
//! compared when correlating replies) and raw bytes (what travels on the
//! serial line).
//!
//! # Frame format
//!
//! ```text
//! 0xFE 0xFE <dst> <src> <opcode...> [<data>...] 0xFD
//! ```
//!
//! - Preamble: two `0xFE` bytes
//! - `dst`: transceiver CI-V address (e.g. `0x94` for IC-7300)
//! - `src`: controller address (typically `0xE0`)
//! - `opcode`: command, sub-command and memory-item bytes (`1A 05 00 95`
//!   selects the IC-7300 clock)
//! - `data`: payload, decimal digits packed two per byte
//! - Terminator: `0xFD`
//!
//! A positive acknowledgement from the rig swaps the addresses:
//! `FE FE <src> <dst> FB FD`.

use bytes::{BufMut, BytesMut};
use civclock_core::{Error, Result};

/// Preamble byte repeated twice at the start of every CI-V frame.
pub const PREAMBLE: u8 = 0xFE;

/// Frame terminator byte.
pub const TERMINATOR: u8 = 0xFD;

/// Standard PC controller CI-V address.
pub const CONTROLLER_ADDR: u8 = 0xE0;

/// ACK command byte, positive acknowledgement from the rig.
pub const ACK: u8 = 0xFB;

/// NAK command byte, negative acknowledgement from the rig.
pub const NAK: u8 = 0xFA;

/// Collision indicator byte on the CI-V bus.
pub const COLLISION: u8 = 0xFC;

/// Hex form of the preamble.
pub const PREAMBLE_HEX: &str = "FEFE";

/// Hex form of the terminator.
pub const POSTAMBLE_HEX: &str = "FD";

/// Hex form of the ACK byte.
pub const ACK_HEX: &str = "FB";

// ---------------------------------------------------------------
// Hex representation
// ---------------------------------------------------------------

/// Build a frame as an uppercase hex string.
///
/// All fields are expected to be already-validated hex (two digits per
/// byte); they are concatenated between the preamble and postamble without
/// further checks.
///
/// # Example
///
/// ```
/// use civclock_icom::civ::build_frame;
///
/// let frame = build_frame("94", "E0", "1A050095", "1340");
/// assert_eq!(frame, "FEFE94E01A0500951340FD");
/// ```
pub fn build_frame(transceiver: &str, controller: &str, opcode: &str, payload: &str) -> String {
    let mut frame = String::with_capacity(
        PREAMBLE_HEX.len()
            + transceiver.len()
            + controller.len()
            + opcode.len()
            + payload.len()
            + POSTAMBLE_HEX.len(),
    );
    frame.push_str(PREAMBLE_HEX);
    frame.push_str(transceiver);
    frame.push_str(controller);
    frame.push_str(opcode);
    frame.push_str(payload);
    frame.push_str(POSTAMBLE_HEX);
    frame.to_ascii_uppercase()
}

/// The acknowledgement frame the transceiver sends back on success.
///
/// Addresses are in reply order: to the controller, from the transceiver.
///
/// ```
/// use civclock_icom::civ::expected_acknowledgement;
///
/// assert_eq!(expected_acknowledgement("E0", "94"), "FEFEE094FBFD");
/// ```
pub fn expected_acknowledgement(controller: &str, transceiver: &str) -> String {
    build_frame(controller, transceiver, ACK_HEX, "")
}

/// Encode bytes as uppercase hex with no separators.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode a hex string (either case) into bytes.
///
/// Fails with [`Error::Format`] on odd length or a non-hex digit.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    hex::decode(hex).map_err(|e| Error::Format(format!("invalid hex {hex:?}: {e}")))
}

/// Format `value` as exactly `digits` zero-padded decimal digits.
///
/// CI-V clock payloads carry decimal digits packed two per byte, so the
/// decimal string doubles as the hex payload (`13:40` becomes `"1340"`,
/// bytes `0x13 0x40`).
pub fn to_bcd_digits(value: u32, digits: usize) -> String {
    format!("{value:0digits$}")
}

/// Returns `true` if `s` is a single byte written as two hex digits.
pub fn is_hex_byte(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ---------------------------------------------------------------
// Byte representation
// ---------------------------------------------------------------

/// A parsed CI-V frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CivFrame {
    /// Destination CI-V address.
    pub dst_addr: u8,
    /// Source CI-V address.
    pub src_addr: u8,
    /// Everything between the addresses and the terminator: opcode bytes
    /// followed by payload. `[0xFB]` for an ACK.
    pub body: Vec<u8>,
}

impl CivFrame {
    /// Returns `true` if this frame is a positive acknowledgement (ACK).
    pub fn is_ack(&self) -> bool {
        self.body == [ACK]
    }

    /// Returns `true` if this frame is a negative acknowledgement (NAK).
    pub fn is_nak(&self) -> bool {
        self.body == [NAK]
    }
}

/// Encode a frame into raw bytes ready for transmission.
///
/// ```
/// use civclock_icom::civ::{encode_frame, CONTROLLER_ADDR};
///
/// let bytes = encode_frame(0x94, CONTROLLER_ADDR, &[0x1A, 0x05, 0x00, 0x95], &[0x13, 0x40]);
/// assert_eq!(bytes, vec![0xFE, 0xFE, 0x94, 0xE0, 0x1A, 0x05, 0x00, 0x95, 0x13, 0x40, 0xFD]);
/// ```
pub fn encode_frame(dst_addr: u8, src_addr: u8, opcode: &[u8], data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(4 + opcode.len() + data.len() + 1);
    buf.put_u8(PREAMBLE);
    buf.put_u8(PREAMBLE);
    buf.put_u8(dst_addr);
    buf.put_u8(src_addr);
    buf.put_slice(opcode);
    buf.put_slice(data);
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// Encode a [`CivFrame`] into raw bytes.
pub fn encode_civ_frame(frame: &CivFrame) -> Vec<u8> {
    encode_frame(frame.dst_addr, frame.src_addr, &frame.body, &[])
}

/// Result of attempting to decode a frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame and the number of bytes consumed (including any
    /// garbage skipped before the preamble).
    Frame(CivFrame, usize),

    /// No complete frame yet.
    Incomplete,

    /// A bus collision or malformed frame; discard this many bytes.
    Collision(usize),
}

/// Attempt to decode one CI-V frame from the front of `buf`.
///
/// Bytes before the first preamble are skipped.
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    let Some(preamble_pos) = find_preamble(buf) else {
        return DecodeResult::Incomplete;
    };

    let body_start = preamble_pos + 2;
    if body_start >= buf.len() {
        return DecodeResult::Incomplete;
    }

    // Some interfaces pad with extra preamble bytes.
    let body_start = body_start
        + buf[body_start..]
            .iter()
            .take_while(|&&b| b == PREAMBLE)
            .count();

    let Some(rel) = buf[body_start..].iter().position(|&b| b == TERMINATOR) else {
        if buf[body_start..].contains(&COLLISION) {
            return DecodeResult::Collision(buf.len());
        }
        return DecodeResult::Incomplete;
    };
    let term_pos = body_start + rel;
    let consumed = term_pos + 1;

    let inner = &buf[body_start..term_pos];
    if inner.contains(&COLLISION) || inner.len() < 3 {
        return DecodeResult::Collision(consumed);
    }

    let frame = CivFrame {
        dst_addr: inner[0],
        src_addr: inner[1],
        body: inner[2..].to_vec(),
    };
    DecodeResult::Frame(frame, consumed)
}

fn find_preamble(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == PREAMBLE && w[1] == PREAMBLE)
}
