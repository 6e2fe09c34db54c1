//! Line coding encoding and decoding
//!
//! The CDC-ACM `SET_LINE_CODING` / `GET_LINE_CODING` payload:
//!
//! ```text
//! [dwDTERate: u32 (little-endian)][bCharFormat: u8][bParityType: u8][bDataBits: u8]
//! ```

use crate::error::{ProtocolError, Result};
use crate::types::{LineSettings, Parity, StopBits, validate_data_bits};
use byteorder::{ByteOrder, LittleEndian};

/// Size of the line coding structure on the wire
pub const LINE_CODING_LEN: usize = 7;

/// Character size sent when framing is not taken from the caller
const FIXED_DATA_BITS: u8 = 8;

/// CDC-ACM line coding structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoding {
    /// Data terminal rate in bits per second
    pub dte_rate: u32,
    /// Stop bits (`bCharFormat`)
    pub char_format: StopBits,
    /// Parity (`bParityType`)
    pub parity_type: Parity,
    /// Character size (`bDataBits`)
    pub data_bits: u8,
}

impl LineCoding {
    /// Line coding carrying every field of the caller's settings
    pub fn from_settings(settings: &LineSettings) -> Self {
        Self {
            dte_rate: settings.baud_rate,
            char_format: settings.stop_bits,
            parity_type: settings.parity,
            data_bits: settings.data_bits,
        }
    }

    /// Line coding with only the baud rate taken from the caller
    ///
    /// Framing is pinned to 8N1, which is what devices configured through
    /// this path have historically received.
    pub fn fixed(baud_rate: u32) -> Self {
        Self {
            dte_rate: baud_rate,
            char_format: StopBits::One,
            parity_type: Parity::None,
            data_bits: FIXED_DATA_BITS,
        }
    }

    /// Encode to the 7-byte wire payload
    pub fn encode(&self) -> [u8; LINE_CODING_LEN] {
        let mut buf = [0u8; LINE_CODING_LEN];
        LittleEndian::write_u32(&mut buf[0..4], self.dte_rate);
        buf[4] = self.char_format.code();
        buf[5] = self.parity_type.code();
        buf[6] = self.data_bits;
        buf
    }

    /// Decode a wire payload
    ///
    /// Trailing bytes beyond the 7-byte structure are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LINE_CODING_LEN {
            return Err(ProtocolError::BufferTooSmall {
                needed: LINE_CODING_LEN,
                available: bytes.len(),
            });
        }

        validate_data_bits(bytes[6])?;

        Ok(Self {
            dte_rate: LittleEndian::read_u32(&bytes[0..4]),
            char_format: StopBits::from_code(bytes[4])?,
            parity_type: Parity::from_code(bytes[5])?,
            data_bits: bytes[6],
        })
    }

    /// Convert back to caller-facing settings
    pub fn to_settings(&self) -> LineSettings {
        LineSettings {
            baud_rate: self.dte_rate,
            data_bits: self.data_bits,
            parity: self.parity_type,
            stop_bits: self.char_format,
        }
    }
}
