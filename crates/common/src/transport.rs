//! USB transport seam
//!
//! The serial session never touches libusb directly. It talks to a
//! [`UsbTransport`] obtained from a [`UsbBackend`], so the same session logic
//! runs against a real descriptor-wrapped device or against the scripted mock
//! in [`crate::test_utils`].
//!
//! Errors are plain `rusb::Error` values on both sides so that timeout and
//! disconnect classification is identical for real and simulated devices.

use std::time::Duration;
use thiserror::Error;

/// Platform descriptor handed out by the broker that owns USB permissions
pub type RawDescriptor = i32;

/// Failures while turning a descriptor into an open transport
#[derive(Debug, Error)]
pub enum BackendError {
    /// Descriptor can never refer to an open file
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(RawDescriptor),

    /// USB context allocation failed
    #[error("Failed to initialise USB context: {0}")]
    Init(#[source] rusb::Error),

    /// The context could not adopt the descriptor
    #[error("Failed to wrap descriptor {fd}: {source}")]
    Wrap {
        fd: RawDescriptor,
        #[source]
        source: rusb::Error,
    },

    /// Descriptor wrapping is only available on unix platforms
    #[error("Wrapping descriptors is not supported on this platform")]
    Unsupported,
}

/// An open communication handle to a single USB device
///
/// Dropping the transport closes the handle and releases the USB context
/// behind it.
pub trait UsbTransport {
    /// Vendor and product identifiers from the device descriptor
    fn device_ids(&self) -> rusb::Result<(u16, u16)>;

    /// Whether a kernel driver is bound to `interface`
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;

    /// Detach the kernel driver bound to `interface`
    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    /// Claim `interface` for exclusive use
    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// Release a previously claimed `interface`
    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// Host-to-device control transfer
    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Device-to-host control transfer
    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Bulk IN transfer; a zero `timeout` blocks indefinitely
    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    /// Bulk OUT transfer
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize>;
}

/// Produces transports from platform descriptors
pub trait UsbBackend {
    type Transport: UsbTransport;

    /// Allocate a USB context and bind it to `fd`
    ///
    /// On failure nothing allocated by this call outlives it.
    fn open_descriptor(&self, fd: RawDescriptor) -> Result<Self::Transport, BackendError>;
}
