//! Serial port over a pre-opened USB CDC-ACM descriptor
//!
//! On sandboxed platforms a privileged broker opens the USB device and hands
//! the application a raw file descriptor. This crate wraps that descriptor
//! with libusb, configures the CDC-ACM function with class control
//! transfers, and exposes blocking byte-stream I/O over its bulk endpoints.
//!
//! # Example
//!
//! ```no_run
//! use protocol::LineSettings;
//! use std::time::Duration;
//! use usb_serial::SerialSession;
//!
//! # fn main() -> Result<(), usb_serial::SessionError> {
//! let fd = 17; // supplied by the platform
//! let mut port = SerialSession::from_descriptor(fd, false);
//!
//! let report = port.open(LineSettings::new(115_200))?;
//! for issue in &report.issues {
//!     eprintln!("open: {}", issue);
//! }
//!
//! port.set_timeout(Duration::from_millis(200));
//! port.write(b"AT\r\n")?;
//!
//! let mut buf = [0u8; 64];
//! let n = port.read(&mut buf)?;
//! println!("{:?}", &buf[..n]);
//!
//! port.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod port;
pub mod session;
pub mod stream;
pub mod usb;

pub use config::{
    FramingMode, MAX_READ_ERROR_BUDGET, OpenPolicy, PortConfig, SessionSettings,
};
pub use error::{OpenIssue, ReleaseFailure, Result, SessionError};
pub use port::{FdPortFactory, PortFactory, SerialPort};
pub use session::{OpenReport, SerialSession};
pub use stream::{ReadReport, ReadState};
