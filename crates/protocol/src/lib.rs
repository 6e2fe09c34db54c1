//! CDC-ACM wire protocol
//!
//! This crate defines the USB Communications Device Class (Abstract Control
//! Model) vocabulary needed to drive a virtual serial port over raw USB
//! transfers: class request codes, endpoint addresses, line settings and the
//! 7-byte line coding structure pushed with `SET_LINE_CODING`.
//!
//! # Example
//!
//! ```
//! use protocol::{LineCoding, LineSettings, Parity, StopBits};
//!
//! let settings = LineSettings {
//!     baud_rate: 9600,
//!     data_bits: 8,
//!     parity: Parity::None,
//!     stop_bits: StopBits::One,
//! };
//!
//! let payload = LineCoding::from_settings(&settings).encode();
//! assert_eq!(payload, [0x80, 0x25, 0x00, 0x00, 0x00, 0x00, 0x08]);
//!
//! let decoded = LineCoding::decode(&payload).unwrap();
//! assert_eq!(decoded.dte_rate, 9600);
//! ```

pub mod cdc;
pub mod codec;
pub mod error;
pub mod types;

pub use codec::{LINE_CODING_LEN, LineCoding};
pub use error::{ProtocolError, Result};
pub use types::{LineSettings, Parity, StopBits};
