//! Protocol error types

use thiserror::Error;

/// Line coding and line settings errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Baud rate of zero
    #[error("Invalid baud rate: must be greater than 0")]
    InvalidBaudRate,

    /// Character size outside what CDC-ACM defines
    #[error("Invalid data bits: {0} (expected 5, 6, 7, 8 or 16)")]
    InvalidDataBits(u8),

    /// Unknown `bParityType` code
    #[error("Invalid parity code: {0}")]
    InvalidParity(u8),

    /// Unknown `bCharFormat` code
    #[error("Invalid stop bits code: {0}")]
    InvalidStopBits(u8),

    /// Buffer too small for operation
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
