//! Common utilities for usb-serial-fd
//!
//! This crate provides the pieces shared between the serial port core and its
//! tests: error handling, logging setup, the USB transport seam that lets the
//! session run against either libusb or a scripted device, and test helpers.

pub mod error;
pub mod logging;
pub mod test_utils;
pub mod transport;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use transport::{BackendError, RawDescriptor, UsbBackend, UsbTransport};
