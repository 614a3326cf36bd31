//! Command framing and response validation for the module's SPI protocol.
//!
//! The module echoes the leading bytes of every command back verbatim, so a
//! positional compare of the response against the expected prefix doubles as
//! an integrity check against bus glitches or misalignment. A response that
//! fails the compare is discarded, never partially interpreted.

use bytes::Buf;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Leading byte of a normal reply.
pub const PACKET_CONF: u8 = 0x55;
/// Reply byte to an acknowledge command.
pub const ACK_CONF: u8 = 0x33;
/// Stop marker terminating buffer-read frames.
pub const STOP_CONF: u8 = 0x16;

/// Full-scale raw sample value; raw 1024 maps to a normalized reading of 1.0.
pub const FULL_SCALE: u16 = 1024;

/// The module keeps the last 10 samples per channel in a ring buffer.
pub const BUFFER_WORDS: u8 = 10;

/// Wildcard position in a validation expectation.
pub const ANY: Option<u8> = None;

/// Command opcodes understood by the module firmware.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Command {
    Ack = 0x00,
    FirmwareVersion = 0x01,
    ReadLight = 0x02,
    ReadSound = 0x03,
    SetLightTrigger = 0x04,
    SetSoundTrigger = 0x05,
    FetchTriggerValues = 0x06,
}

/// An outgoing frame paired with the shape its echoed response must have.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub command: Command,
    /// Bytes clocked out on the bus. The response has the same length.
    pub tx: Vec<u8>,
    /// Expected leading response bytes; `None` positions match anything.
    pub expect: Vec<Option<u8>>,
    /// Whether the response must end with the stop marker.
    pub expect_stop: bool,
}

impl Request {
    /// Buffer read: `[opcode, words, 0]`, a zero-filled region the module
    /// overwrites with `words` big-endian samples, then the stop marker.
    pub fn read_buffer(command: Command, words: u8) -> Self {
        let mut tx = vec![command.into(), words, 0x00];
        tx.resize(3 + 2 * words as usize, 0x00);
        tx.push(STOP_CONF);
        Request {
            command,
            tx,
            expect: vec![Some(PACKET_CONF), Some(command.into()), Some(words)],
            expect_stop: true,
        }
    }

    /// Trigger level set: `[opcode, hi, lo, 0]`, echoed back in full.
    pub fn set_trigger(command: Command, raw: u16) -> Self {
        let [hi, lo] = raw.to_be_bytes();
        Request {
            command,
            tx: vec![command.into(), hi, lo, 0x00],
            expect: vec![Some(PACKET_CONF), Some(command.into()), Some(hi), Some(lo)],
            expect_stop: false,
        }
    }

    /// Fetch the latched trigger values: two big-endian words follow the echo.
    pub fn fetch_trigger_values() -> Self {
        let command = Command::FetchTriggerValues;
        Request {
            command,
            tx: vec![command.into(), 0x00, 0x00, 0x00, 0x00, 0x00],
            expect: vec![Some(PACKET_CONF), Some(command.into())],
            expect_stop: false,
        }
    }

    /// Firmware version handshake. The leading byte is not checked; some
    /// module revisions answer the very first exchange with garbage there.
    pub fn firmware_version() -> Self {
        let command = Command::FirmwareVersion;
        Request {
            command,
            tx: vec![command.into(), 0x00, 0x00],
            expect: vec![ANY, Some(command.into())],
            expect_stop: false,
        }
    }

    /// Acknowledge round trip, a cheap aliveness check.
    pub fn ack() -> Self {
        let command = Command::Ack;
        Request {
            command,
            tx: vec![command.into(), 0x00, 0x00],
            expect: vec![Some(PACKET_CONF), Some(command.into()), Some(ACK_CONF)],
            expect_stop: false,
        }
    }

    /// Structural check of a response to this request.
    pub fn check(&self, response: &[u8]) -> bool {
        if !validate(response, &self.expect) {
            return false;
        }
        if self.expect_stop && response.last() != Some(&STOP_CONF) {
            return false;
        }
        true
    }
}

/// Positional compare of a response against an expectation. Wildcard
/// positions match anything; a response too short for a non-wildcard
/// position fails.
pub fn validate(response: &[u8], expected: &[Option<u8>]) -> bool {
    expected
        .iter()
        .enumerate()
        .all(|(i, exp)| match exp {
            Some(byte) => response.get(i) == Some(byte),
            None => true,
        })
}

/// Scale a raw sample to a normalized reading in `[0.0, 1.0]`.
pub fn normalize(raw: u16) -> f64 {
    raw as f64 / FULL_SCALE as f64
}

/// Convert a threshold fraction to the raw value sent to the module.
pub fn quantize(fraction: f64) -> u16 {
    (fraction * FULL_SCALE as f64).ceil() as u16
}

/// Decode a run of big-endian 16-bit samples into normalized readings,
/// preserving order. The module sends newest-first.
pub fn decode_buffer(mut raw: &[u8]) -> Vec<f64> {
    let mut readings = Vec::with_capacity(raw.len() / 2);
    while raw.remaining() >= 2 {
        readings.push(normalize(raw.get_u16()));
    }
    readings
}
