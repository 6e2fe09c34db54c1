//! Test utilities for usb-serial-fd
//!
//! Provides a scripted USB backend that stands in for a CDC-ACM device, so
//! session and stream behaviour can be checked without hardware.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{MockBackend, MockRead};
//! use common::{UsbBackend, UsbTransport};
//! use std::time::Duration;
//!
//! let backend = MockBackend::new();
//! backend.push_read(MockRead::Data(b"hello".to_vec()));
//!
//! let transport = backend.open_descriptor(3).unwrap();
//! let mut buf = [0u8; 8];
//! let n = transport.read_bulk(0x81, &mut buf, Duration::ZERO).unwrap();
//! assert_eq!(&buf[..n], b"hello");
//! ```

use crate::transport::{BackendError, RawDescriptor, UsbBackend, UsbTransport};
use protocol::cdc::{GET_LINE_CODING, SET_LINE_CODING};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Vendor ID reported by the mock device
pub const MOCK_VENDOR_ID: u16 = 0x2341;

/// Product ID reported by the mock device
pub const MOCK_PRODUCT_ID: u16 = 0x0043;

/// One scripted response to a bulk IN transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// Deliver these bytes; anything beyond the caller's buffer stays queued
    Data(Vec<u8>),
    /// Report `rusb::Error::Timeout`
    Timeout,
    /// Report an arbitrary transfer error
    Error(rusb::Error),
}

/// A recorded control transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
    pub timeout: Duration,
}

/// Behaviour script and call record shared by a backend and its transports
#[derive(Debug)]
pub struct MockState {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Context allocation fails with this error
    pub fail_init: Option<rusb::Error>,
    /// Descriptor wrapping fails with this error
    pub fail_wrap: Option<rusb::Error>,
    /// Descriptor lookup fails after the handle is bound
    pub fail_descriptor: bool,
    /// Interfaces that report a bound kernel driver
    pub kernel_driver_active: Vec<u8>,
    /// Interfaces whose claim fails with `Busy`
    pub fail_claim: Vec<u8>,
    /// Interfaces whose release fails with `NoDevice`
    pub fail_release: Vec<u8>,
    /// Control request codes that stall with `Pipe`
    pub fail_control: Vec<u8>,
    /// Bulk IN script; an exhausted script reports a timeout
    pub reads: VecDeque<MockRead>,
    /// Maximum bytes accepted per bulk OUT transfer
    pub write_limit: Option<usize>,
    /// Every bulk OUT transfer fails with this error
    pub write_error: Option<rusb::Error>,

    pub descriptors: Vec<RawDescriptor>,
    pub detached: Vec<u8>,
    pub claimed: Vec<u8>,
    pub released: Vec<u8>,
    pub controls: Vec<ControlCall>,
    pub read_endpoints: Vec<u8>,
    pub read_timeouts: Vec<Duration>,
    pub write_endpoints: Vec<u8>,
    pub write_timeouts: Vec<Duration>,
    pub written: Vec<u8>,
    /// Last payload accepted by `SET_LINE_CODING`
    pub line_coding: Option<Vec<u8>>,
    /// Number of transports dropped
    pub closed: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            vendor_id: MOCK_VENDOR_ID,
            product_id: MOCK_PRODUCT_ID,
            fail_init: None,
            fail_wrap: None,
            fail_descriptor: false,
            kernel_driver_active: Vec::new(),
            fail_claim: Vec::new(),
            fail_release: Vec::new(),
            fail_control: Vec::new(),
            reads: VecDeque::new(),
            write_limit: None,
            write_error: None,
            descriptors: Vec::new(),
            detached: Vec::new(),
            claimed: Vec::new(),
            released: Vec::new(),
            controls: Vec::new(),
            read_endpoints: Vec::new(),
            read_timeouts: Vec::new(),
            write_endpoints: Vec::new(),
            write_timeouts: Vec::new(),
            written: Vec::new(),
            line_coding: None,
            closed: 0,
        }
    }
}

impl MockState {
    /// Control transfers issued with `request`
    pub fn controls_for(&self, request: u8) -> Vec<&ControlCall> {
        self.controls.iter().filter(|c| c.request == request).collect()
    }
}

/// Scripted backend that accepts every non-negative descriptor
///
/// Clones share the same [`MockState`], so a test can keep one clone for
/// inspection after handing another to a session.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    /// Create a backend for a device that accepts every transfer
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the shared state for inspection
    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    /// Borrow the shared state for scripting
    pub fn state_mut(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    /// Queue a bulk IN response
    pub fn push_read(&self, read: MockRead) {
        self.state.borrow_mut().reads.push_back(read);
    }
}

impl UsbBackend for MockBackend {
    type Transport = MockTransport;

    fn open_descriptor(&self, fd: RawDescriptor) -> Result<MockTransport, BackendError> {
        if fd < 0 {
            return Err(BackendError::InvalidDescriptor(fd));
        }

        let mut state = self.state.borrow_mut();
        if let Some(err) = state.fail_init {
            return Err(BackendError::Init(err));
        }
        if let Some(err) = state.fail_wrap {
            return Err(BackendError::Wrap { fd, source: err });
        }
        state.descriptors.push(fd);
        drop(state);

        Ok(MockTransport {
            state: Rc::clone(&self.state),
        })
    }
}

/// Transport handed out by [`MockBackend`]
#[derive(Debug)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl UsbTransport for MockTransport {
    fn device_ids(&self) -> rusb::Result<(u16, u16)> {
        let state = self.state.borrow();
        if state.fail_descriptor {
            return Err(rusb::Error::Io);
        }
        Ok((state.vendor_id, state.product_id))
    }

    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        let state = self.state.borrow();
        Ok(state.kernel_driver_active.contains(&interface) && !state.detached.contains(&interface))
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        self.state.borrow_mut().detached.push(interface);
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_claim.contains(&interface) {
            return Err(rusb::Error::Busy);
        }
        state.claimed.push(interface);
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_release.contains(&interface) {
            return Err(rusb::Error::NoDevice);
        }
        state.released.push(interface);
        Ok(())
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
        let mut state = self.state.borrow_mut();
        state.controls.push(ControlCall {
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
            timeout,
        });
        if state.fail_control.contains(&request) {
            return Err(rusb::Error::Pipe);
        }
        if request == SET_LINE_CODING {
            state.line_coding = Some(data.to_vec());
        }
        Ok(data.len())
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
        let mut state = self.state.borrow_mut();
        state.controls.push(ControlCall {
            request_type,
            request,
            value,
            index,
            data: Vec::new(),
            timeout,
        });
        if state.fail_control.contains(&request) || request != GET_LINE_CODING {
            return Err(rusb::Error::Pipe);
        }
        let coding = state.line_coding.as_deref().ok_or(rusb::Error::Pipe)?;
        let n = coding.len().min(buf.len());
        buf[..n].copy_from_slice(&coding[..n]);
        Ok(n)
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.read_endpoints.push(endpoint);
        state.read_timeouts.push(timeout);

        match state.reads.pop_front() {
            Some(MockRead::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    state.reads.push_front(MockRead::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(MockRead::Error(err)) => Err(err),
            Some(MockRead::Timeout) | None => Err(rusb::Error::Timeout),
        }
    }

    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.write_endpoints.push(endpoint);
        state.write_timeouts.push(timeout);

        if let Some(err) = state.write_error {
            return Err(err);
        }
        let n = state.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}
