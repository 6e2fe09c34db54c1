//! Serial line type definitions
//!
//! Caller-facing line parameters and their CDC-ACM wire codes.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Parity checking mode
///
/// Discriminants are the `bParityType` codes of the line coding structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Wire code (`bParityType`)
    pub fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Parity::None),
            1 => Ok(Parity::Odd),
            2 => Ok(Parity::Even),
            3 => Ok(Parity::Mark),
            4 => Ok(Parity::Space),
            other => Err(ProtocolError::InvalidParity(other)),
        }
    }
}

/// Number of stop bits
///
/// Discriminants are the `bCharFormat` codes of the line coding structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Wire code (`bCharFormat`)
    pub fn code(self) -> u8 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StopBits::One),
            1 => Ok(StopBits::OnePointFive),
            2 => Ok(StopBits::Two),
            other => Err(ProtocolError::InvalidStopBits(other)),
        }
    }
}

/// Line parameters requested by the caller on open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSettings {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Character size, 5 to 8 bits
    pub data_bits: u8,
    /// Parity mode
    #[serde(default)]
    pub parity: Parity,
    /// Stop bits
    #[serde(default)]
    pub stop_bits: StopBits,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl LineSettings {
    /// Shorthand for `baud` with 8 data bits, no parity and one stop bit
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    /// Reject settings no CDC-ACM device can represent
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(ProtocolError::InvalidBaudRate);
        }
        validate_data_bits(self.data_bits)
    }
}

pub(crate) fn validate_data_bits(bits: u8) -> Result<()> {
    match bits {
        5..=8 | 16 => Ok(()),
        other => Err(ProtocolError::InvalidDataBits(other)),
    }
}
