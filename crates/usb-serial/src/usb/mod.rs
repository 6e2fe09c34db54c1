//! USB subsystem
//!
//! libusb-backed implementation of the transport seam. A platform descriptor
//! is wrapped into a device handle without enumerating the bus, which is the
//! only way to reach a device when a broker hands out raw file descriptors.

pub mod device;
pub mod transfers;

// Re-export public types
pub use device::{RusbBackend, RusbTransport};
pub use transfers::{TransferOutcome, classify};
