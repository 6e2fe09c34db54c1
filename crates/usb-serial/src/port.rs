//! Port abstraction and descriptor-based factory
//!
//! [`SerialPort`] is the contract higher layers program against. Ports are
//! never discovered here: the platform broker hands out descriptors, and
//! [`FdPortFactory`] turns each one into a [`SerialSession`]. Enumeration
//! therefore always yields an empty sequence.

use crate::config::{PortConfig, SessionSettings};
use crate::error::Result;
use crate::session::{OpenReport, SerialSession};
use crate::usb::RusbBackend;
use common::{RawDescriptor, UsbBackend};
use protocol::LineSettings;
use std::time::Duration;
use tracing::debug;

/// Blocking serial port
pub trait SerialPort {
    fn name(&self) -> &str;
    fn is_usb(&self) -> bool;
    fn is_trick(&self) -> bool;

    fn open(&mut self, line: LineSettings) -> Result<OpenReport>;
    fn close(&mut self) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn get(&mut self) -> Result<Option<u8>>;
    fn put(&mut self, byte: u8) -> Result<usize>;

    fn set_timeout(&mut self, timeout: Duration);
    fn flush(&mut self);
    fn set_auto_flush(&mut self, auto_flush: bool);
}

impl<B: UsbBackend> SerialPort for SerialSession<B> {
    fn name(&self) -> &str {
        SerialSession::name(self)
    }

    fn is_usb(&self) -> bool {
        SerialSession::is_usb(self)
    }

    fn is_trick(&self) -> bool {
        SerialSession::is_trick(self)
    }

    fn open(&mut self, line: LineSettings) -> Result<OpenReport> {
        SerialSession::open(self, line)
    }

    fn close(&mut self) -> Result<()> {
        SerialSession::close(self)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        SerialSession::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        SerialSession::write(self, buf)
    }

    fn get(&mut self) -> Result<Option<u8>> {
        SerialSession::get(self)
    }

    fn put(&mut self, byte: u8) -> Result<usize> {
        SerialSession::put(self, byte)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        SerialSession::set_timeout(self, timeout)
    }

    fn flush(&mut self) {
        SerialSession::flush(self)
    }

    fn set_auto_flush(&mut self, auto_flush: bool) {
        SerialSession::set_auto_flush(self, auto_flush)
    }
}

/// Creates ports and enumerates their names
pub trait PortFactory {
    type Port: SerialPort;

    /// Start an enumeration and return the first port name
    fn begin(&mut self) -> Option<String>;

    /// Next port name of the current enumeration
    fn next(&mut self) -> Option<String>;

    /// Finish the current enumeration
    fn end(&mut self);

    /// Port for a descriptor supplied by the platform
    fn create(&self, fd: RawDescriptor, trick: bool) -> Self::Port;

    /// Port for a device path, where the platform allows opening by name
    fn create_named(&self, name: &str) -> Option<Self::Port>;

    /// Collect a full enumeration
    fn ports(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self.begin();
        while let Some(name) = current {
            names.push(name);
            current = self.next();
        }
        self.end();
        names
    }
}

/// Factory for sessions over broker-supplied descriptors
#[derive(Debug, Clone)]
pub struct FdPortFactory<B: UsbBackend + Clone = RusbBackend> {
    backend: B,
    settings: SessionSettings,
}

impl FdPortFactory<RusbBackend> {
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_backend(RusbBackend, settings)
    }

    pub fn from_config(config: &PortConfig) -> Self {
        Self::new(config.session.clone())
    }
}

impl Default for FdPortFactory<RusbBackend> {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl<B: UsbBackend + Clone> FdPortFactory<B> {
    pub fn with_backend(backend: B, settings: SessionSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

impl<B: UsbBackend + Clone> PortFactory for FdPortFactory<B> {
    type Port = SerialSession<B>;

    // No filesystem scan is possible when ports arrive as descriptors
    fn begin(&mut self) -> Option<String> {
        self.next()
    }

    fn next(&mut self) -> Option<String> {
        None
    }

    fn end(&mut self) {}

    fn create(&self, fd: RawDescriptor, trick: bool) -> SerialSession<B> {
        debug!("Creating port for descriptor {} (trick={})", fd, trick);
        SerialSession::with_backend(self.backend.clone(), fd, trick, self.settings.clone())
    }

    fn create_named(&self, name: &str) -> Option<SerialSession<B>> {
        debug!("Cannot open port '{}' by name: descriptors only", name);
        None
    }
}
