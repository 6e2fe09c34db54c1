//! Descriptor-wrapped USB device
//!
//! This module provides [`RusbBackend`], which turns a platform descriptor
//! into a [`RusbTransport`] wrapping an `rusb::DeviceHandle`.
//!
//! The handle keeps its own reference to the USB context, so dropping the
//! transport closes the handle and tears the context down with it.

use common::{BackendError, RawDescriptor, UsbBackend, UsbTransport};
use rusb::{Context, DeviceHandle};
use std::time::Duration;
use tracing::debug;

/// Backend that wraps descriptors with libusb
#[derive(Debug, Clone, Copy, Default)]
pub struct RusbBackend;

impl UsbBackend for RusbBackend {
    type Transport = RusbTransport;

    #[cfg(unix)]
    fn open_descriptor(&self, fd: RawDescriptor) -> Result<RusbTransport, BackendError> {
        use rusb::UsbContext;

        if fd < 0 {
            return Err(BackendError::InvalidDescriptor(fd));
        }

        // Scanning the bus needs permissions a sandboxed process does not have
        if let Err(e) = rusb::disable_device_discovery() {
            debug!("Could not disable device discovery: {}", e);
        }

        let context = Context::new().map_err(BackendError::Init)?;

        // SAFETY: the descriptor refers to a usbfs node opened by the platform
        // broker, which keeps it open for at least as long as this handle.
        // libusb adopts it without taking ownership.
        let handle = unsafe { context.open_device_with_fd(fd) }
            .map_err(|source| BackendError::Wrap { fd, source })?;

        debug!("Wrapped descriptor {} into a device handle", fd);
        Ok(RusbTransport { handle })
    }

    #[cfg(not(unix))]
    fn open_descriptor(&self, fd: RawDescriptor) -> Result<RusbTransport, BackendError> {
        if fd < 0 {
            return Err(BackendError::InvalidDescriptor(fd));
        }
        Err(BackendError::Unsupported)
    }
}

/// Open communication handle owned by a serial session
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
}

impl std::fmt::Debug for RusbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusbTransport").finish_non_exhaustive()
    }
}

impl UsbTransport for RusbTransport {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        let descriptor = self.handle.device().device_descriptor()?;
        Ok((descriptor.vendor_id(), descriptor.product_id()))
    }

    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        self.handle.kernel_driver_active(interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.detach_kernel_driver(interface)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.claim_interface(interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.handle.release_interface(interface)
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .write_control(request_type, request, value, index, data, timeout)
    }

    fn read_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .read_control(request_type, request, value, index, buf, timeout)
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.read_bulk(endpoint, buf, timeout)
    }

    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.write_bulk(endpoint, buf, timeout)
    }
}
