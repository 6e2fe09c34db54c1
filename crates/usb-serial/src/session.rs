//! CDC-ACM device session
//!
//! A [`SerialSession`] owns the communication handle for one descriptor from
//! a successful [`open`](SerialSession::open) until the matching
//! [`close`](SerialSession::close) or drop. Opening binds the descriptor,
//! detaches kernel drivers, claims the control and data interfaces and pushes
//! the line coding. Interface and control transfer problems are collected in
//! an [`OpenReport`] rather than failing the open, unless the session runs
//! under [`OpenPolicy::Strict`].
//!
//! Stream operations live in [`crate::stream`].

use crate::config::{FramingMode, OpenPolicy, SessionSettings};
use crate::error::{OpenIssue, ReleaseFailure, Result, SessionError};
use crate::usb::RusbBackend;
use common::{RawDescriptor, UsbBackend, UsbTransport};
use protocol::cdc::{
    self, CONTROL_INTERFACE, GET_LINE_CODING, INTERFACES, REQUEST_TYPE_IN, REQUEST_TYPE_OUT,
    SEND_BREAK, SET_CONTROL_LINE_STATE, SET_LINE_CODING,
};
use protocol::{LINE_CODING_LEN, LineCoding, LineSettings};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name every descriptor-backed port reports
pub const PORT_NAME: &str = "USB";

/// Outcome of a successful open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
    /// Vendor/product pair, if the device descriptor could be read
    pub device_ids: Option<(u16, u16)>,
    /// Interfaces claimed, in claim order
    pub claimed: Vec<u8>,
    /// Payload sent with `SET_LINE_CODING`
    pub line_coding: [u8; LINE_CODING_LEN],
    /// Problems tolerated under the best-effort policy
    pub issues: Vec<OpenIssue>,
}

impl OpenReport {
    /// Whether every configuration step succeeded
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Resources held between open and close
struct Link<T: UsbTransport> {
    transport: T,
    claimed: Vec<u8>,
    device_ids: Option<(u16, u16)>,
    line: LineSettings,
}

impl<T: UsbTransport> Link<T> {
    /// Release every claimed interface, data interface first, then drop the
    /// handle. Every release is attempted regardless of earlier failures.
    fn release(mut self) -> Vec<ReleaseFailure> {
        let mut failures = Vec::new();

        for &interface in self.claimed.iter().rev() {
            match self.transport.release_interface(interface) {
                Ok(()) => debug!("Released interface {}", interface),
                Err(error) => {
                    warn!("Failed to release interface {}: {}", interface, error);
                    failures.push(ReleaseFailure { interface, error });
                }
            }
        }
        self.claimed.clear();

        failures
    }
}

/// Serial port session over a descriptor-wrapped CDC-ACM device
///
/// Not safe for concurrent use; share it behind a mutex if several threads
/// need it.
pub struct SerialSession<B: UsbBackend = RusbBackend> {
    fd: RawDescriptor,
    trick: bool,
    backend: B,
    settings: SessionSettings,
    pub(crate) timeout: Duration,
    pub(crate) auto_flush: bool,
    link: Option<Link<B::Transport>>,
}

impl SerialSession<RusbBackend> {
    /// Session for a descriptor handed out by the platform, using libusb
    pub fn from_descriptor(fd: RawDescriptor, trick: bool) -> Self {
        Self::with_backend(RusbBackend, fd, trick, SessionSettings::default())
    }
}

impl<B: UsbBackend> SerialSession<B> {
    /// Session using an explicit backend and settings
    pub fn with_backend(
        backend: B,
        fd: RawDescriptor,
        trick: bool,
        settings: SessionSettings,
    ) -> Self {
        let timeout = settings.timeout();
        Self {
            fd,
            trick,
            backend,
            settings,
            timeout,
            auto_flush: false,
            link: None,
        }
    }

    /// Descriptor this session was created for
    pub fn descriptor(&self) -> RawDescriptor {
        self.fd
    }

    /// Pass-through flag supplied with the descriptor
    pub fn is_trick(&self) -> bool {
        self.trick
    }

    /// Always true: sessions only drive USB devices
    pub fn is_usb(&self) -> bool {
        true
    }

    /// Port name, always [`PORT_NAME`]
    pub fn name(&self) -> &str {
        PORT_NAME
    }

    /// Whether the device is currently bound
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Transfer settings the session was created with
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Vendor/product pair read during open
    pub fn device_ids(&self) -> Option<(u16, u16)> {
        self.link.as_ref().and_then(|link| link.device_ids)
    }

    /// Line settings requested by the last successful open
    pub fn line_settings(&self) -> Option<LineSettings> {
        self.link.as_ref().map(|link| link.line)
    }

    /// Bind the descriptor and configure the device
    ///
    /// Fails only if the session is already open, the settings are invalid,
    /// or the descriptor cannot be bound (and, under the strict policy, if
    /// any configuration step failed). On failure nothing stays allocated
    /// and the session remains closed.
    pub fn open(&mut self, line: LineSettings) -> Result<OpenReport> {
        if self.link.is_some() {
            return Err(SessionError::AlreadyOpen);
        }
        line.validate()?;

        let mut transport = self.backend.open_descriptor(self.fd).map_err(|e| {
            warn!("Failed to open descriptor {}: {}", self.fd, e);
            e
        })?;

        let device_ids = match transport.device_ids() {
            Ok((vendor_id, product_id)) => {
                info!("USB device {:04x}:{:04x} on descriptor {}", vendor_id, product_id, self.fd);
                Some((vendor_id, product_id))
            }
            Err(e) => {
                warn!("Failed to read device descriptor: {}", e);
                None
            }
        };

        let mut issues = Vec::new();
        let mut claimed = Vec::new();

        // A CDC-ACM function exposes a control and a data interface; the host
        // has most likely bound its cdc-acm driver to both.
        for interface in INTERFACES {
            match transport.kernel_driver_active(interface) {
                Ok(true) => {
                    debug!("Detaching kernel driver from interface {}", interface);
                    if let Err(error) = transport.detach_kernel_driver(interface) {
                        warn!(
                            "Failed to detach kernel driver from interface {}: {}",
                            interface, error
                        );
                        issues.push(OpenIssue::KernelDriver { interface, error });
                    }
                }
                Ok(false) => {
                    debug!("No kernel driver active on interface {}", interface);
                }
                Err(e) => {
                    debug!(
                        "Could not check kernel driver status for interface {}: {}",
                        interface, e
                    );
                }
            }

            match transport.claim_interface(interface) {
                Ok(()) => {
                    debug!("Claimed interface {}", interface);
                    claimed.push(interface);
                }
                Err(error) => {
                    warn!("Failed to claim interface {}: {}", interface, error);
                    issues.push(OpenIssue::ClaimInterface { interface, error });
                }
            }
        }

        let timeout = self.settings.control_timeout();

        if let Err(error) = transport.write_control(
            REQUEST_TYPE_OUT,
            SET_CONTROL_LINE_STATE,
            0,
            u16::from(CONTROL_INTERFACE),
            &[],
            timeout,
        ) {
            warn!("SET_CONTROL_LINE_STATE failed: {}", error);
            issues.push(OpenIssue::ControlTransfer {
                request: SET_CONTROL_LINE_STATE,
                error,
            });
        }

        let coding = match self.settings.framing {
            FramingMode::Fixed => LineCoding::fixed(line.baud_rate),
            FramingMode::FromSettings => LineCoding::from_settings(&line),
        };
        if coding.to_settings() != line {
            debug!(
                "Framing {:?}: sending {}-{:?}-{:?} instead of requested {}-{:?}-{:?}",
                self.settings.framing,
                coding.data_bits,
                coding.parity_type,
                coding.char_format,
                line.data_bits,
                line.parity,
                line.stop_bits
            );
        }
        let payload = coding.encode();

        if let Err(error) = transport.write_control(
            REQUEST_TYPE_OUT,
            SET_LINE_CODING,
            0,
            u16::from(CONTROL_INTERFACE),
            &payload,
            timeout,
        ) {
            warn!("SET_LINE_CODING failed: {}", error);
            issues.push(OpenIssue::ControlTransfer {
                request: SET_LINE_CODING,
                error,
            });
        }

        let link = Link {
            transport,
            claimed,
            device_ids,
            line,
        };

        if self.settings.open_policy == OpenPolicy::Strict && !issues.is_empty() {
            warn!(
                "Rejecting open of descriptor {}: {} configuration issue(s)",
                self.fd,
                issues.len()
            );
            let release = link.release();
            return Err(SessionError::Degraded { issues, release });
        }

        let report = OpenReport {
            device_ids,
            claimed: link.claimed.clone(),
            line_coding: payload,
            issues,
        };
        self.link = Some(link);

        info!(
            "Opened descriptor {} at {} baud ({} issue(s))",
            self.fd,
            line.baud_rate,
            report.issues.len()
        );
        Ok(report)
    }

    /// Release the interfaces, close the handle and tear down the context
    ///
    /// Every claimed interface is released even if an earlier release
    /// fails; the failures are returned together. Closing a session that is
    /// not open does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            debug!("Close on descriptor {} ignored: not open", self.fd);
            return Ok(());
        };

        let failures = link.release();
        info!("Closed descriptor {}", self.fd);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::Release(failures))
        }
    }

    /// Read the line coding currently applied by the device
    pub fn line_coding(&self) -> Result<LineCoding> {
        let transport = self.transport()?;
        let mut buf = [0u8; LINE_CODING_LEN];

        let len = transport
            .read_control(
                REQUEST_TYPE_IN,
                GET_LINE_CODING,
                0,
                u16::from(CONTROL_INTERFACE),
                &mut buf,
                self.settings.control_timeout(),
            )
            .map_err(|source| SessionError::Control {
                request: GET_LINE_CODING,
                source,
            })?;

        Ok(LineCoding::decode(&buf[..len])?)
    }

    /// Drive the DTR and RTS output lines
    pub fn set_control_lines(&self, dtr: bool, rts: bool) -> Result<()> {
        let value = cdc::control_line_state(dtr, rts);
        self.control_out(SET_CONTROL_LINE_STATE, value)?;
        debug!("Control lines set: dtr={} rts={}", dtr, rts);
        Ok(())
    }

    /// Hold the line in break state for `millis` milliseconds
    pub fn send_break(&self, millis: u16) -> Result<()> {
        self.control_out(SEND_BREAK, millis)?;
        debug!("Sent break of {} ms", millis);
        Ok(())
    }

    fn control_out(&self, request: u8, value: u16) -> Result<()> {
        self.transport()?
            .write_control(
                REQUEST_TYPE_OUT,
                request,
                value,
                u16::from(CONTROL_INTERFACE),
                &[],
                self.settings.control_timeout(),
            )
            .map_err(|source| SessionError::Control { request, source })?;
        Ok(())
    }

    pub(crate) fn transport(&self) -> Result<&B::Transport> {
        self.link
            .as_ref()
            .map(|link| &link.transport)
            .ok_or(SessionError::NotOpen)
    }
}

impl<B: UsbBackend> Drop for SerialSession<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing descriptor {} on drop: {}", self.fd, e);
        }
    }
}

impl<B: UsbBackend> std::fmt::Debug for SerialSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSession")
            .field("fd", &self.fd)
            .field("trick", &self.trick)
            .field("open", &self.is_open())
            .field("timeout", &self.timeout)
            .field("auto_flush", &self.auto_flush)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{MOCK_PRODUCT_ID, MOCK_VENDOR_ID, MockBackend};

    fn session(backend: &MockBackend) -> SerialSession<MockBackend> {
        SerialSession::with_backend(backend.clone(), 42, false, SessionSettings::default())
    }

    #[test]
    fn test_open_binds_descriptor() {
        let backend = MockBackend::new();
        let mut port = session(&backend);

        let report = port.open(LineSettings::new(9600)).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.device_ids, Some((MOCK_VENDOR_ID, MOCK_PRODUCT_ID)));
        assert_eq!(report.claimed, vec![0, 1]);
        assert!(port.is_open());
        assert_eq!(backend.state().descriptors, vec![42]);
    }

    #[test]
    fn test_open_twice_rejected() {
        let backend = MockBackend::new();
        let mut port = session(&backend);

        port.open(LineSettings::default()).unwrap();
        assert!(matches!(
            port.open(LineSettings::default()),
            Err(SessionError::AlreadyOpen)
        ));
        // The first open is untouched
        assert!(port.is_open());
        assert_eq!(backend.state().descriptors.len(), 1);
    }

    #[test]
    fn test_invalid_settings_rejected_before_binding() {
        let backend = MockBackend::new();
        let mut port = session(&backend);

        assert!(matches!(
            port.open(LineSettings::new(0)),
            Err(SessionError::Line(_))
        ));
        assert!(backend.state().descriptors.is_empty());
    }

    #[test]
    fn test_accessors() {
        let backend = MockBackend::new();
        let port = SerialSession::with_backend(backend, 7, true, SessionSettings::default());
        assert_eq!(port.descriptor(), 7);
        assert!(port.is_trick());
        assert!(port.is_usb());
        assert_eq!(port.name(), "USB");
        assert!(!port.is_open());
        assert_eq!(port.device_ids(), None);
    }

    #[test]
    fn test_drop_closes() {
        let backend = MockBackend::new();
        {
            let mut port = session(&backend);
            port.open(LineSettings::default()).unwrap();
        }
        let state = backend.state();
        assert_eq!(state.released, vec![1, 0]);
        assert_eq!(state.closed, 1);
    }
}
