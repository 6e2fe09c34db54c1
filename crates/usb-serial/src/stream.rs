//! Byte stream I/O over the bulk endpoints
//!
//! Reads accumulate bulk IN transfers until the buffer is full or a transfer
//! times out; a short count is a normal result, not an error. Writes issue a
//! single bulk OUT transfer and report whatever the device accepted. Callers
//! that need every byte delivered loop at a higher layer, for example with
//! [`std::io::Write::write_all`].

use crate::config::MAX_READ_ERROR_BUDGET;
use crate::error::Result;
use crate::session::SerialSession;
use crate::usb::{TransferOutcome, classify};
use common::{UsbBackend, UsbTransport};
use protocol::cdc::{FLUSH_DELAY, READ_ENDPOINT, WRITE_ENDPOINT};
use std::io;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Where a read stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Still collecting transfers
    Accumulating,
    /// The buffer was filled
    Filled,
    /// A transfer timed out; the count covers what arrived before it
    TimedOut,
    /// The device disconnected or the error budget ran out
    Errored,
}

/// Result of a read call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    /// Bytes placed at the start of the buffer
    pub count: usize,
    /// Why the read stopped
    pub state: ReadState,
    /// Non-timeout transfer errors met along the way
    pub errors: u32,
}

impl<B: UsbBackend> SerialSession<B> {
    /// Read up to `buf.len()` bytes
    ///
    /// Returns early with fewer bytes when a transfer times out.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read_report(buf)?.count)
    }

    /// Read up to `buf.len()` bytes and report why the read stopped
    ///
    /// Each bulk IN transfer is bounded by the session timeout. Transfer
    /// errors other than a timeout are retried until more than
    /// `read_error_budget` of them occur in this call; a disconnected device
    /// ends the read at once. Budgets above [`MAX_READ_ERROR_BUDGET`] are
    /// clamped to it.
    pub fn read_report(&mut self, buf: &mut [u8]) -> Result<ReadReport> {
        let transport = self.transport()?;
        let timeout = self.timeout;
        let budget = self.settings().read_error_budget.min(MAX_READ_ERROR_BUDGET);

        let mut count = 0;
        let mut errors = 0;
        let mut state = ReadState::Accumulating;

        while state == ReadState::Accumulating {
            if count == buf.len() {
                state = ReadState::Filled;
                break;
            }

            match transport.read_bulk(READ_ENDPOINT, &mut buf[count..], timeout) {
                Ok(n) => {
                    trace!("Bulk IN delivered {} bytes", n);
                    count += n;
                }
                Err(e) => match classify(e) {
                    TransferOutcome::Timeout => state = ReadState::TimedOut,
                    TransferOutcome::Disconnected => {
                        warn!("Device gone while reading: {}", e);
                        state = ReadState::Errored;
                    }
                    TransferOutcome::Transient => {
                        errors += 1;
                        warn!(
                            "Error reading at {} of {} bytes: {} (attempt {} of {})",
                            count,
                            buf.len(),
                            e,
                            errors,
                            budget.saturating_add(1)
                        );
                        if errors > budget {
                            state = ReadState::Errored;
                        }
                    }
                },
            }
        }

        if count < buf.len() {
            debug!("Short read: {} of {} bytes ({:?})", count, buf.len(), state);
        }

        Ok(ReadReport {
            count,
            state,
            errors,
        })
    }

    /// Write `buf` in one bulk OUT transfer
    ///
    /// Returns the number of bytes the device accepted, which may be less
    /// than `buf.len()`; a failed transfer reports 0.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let transport = self.transport()?;
        if buf.is_empty() {
            return Ok(0);
        }

        match transport.write_bulk(WRITE_ENDPOINT, buf, self.settings().write_timeout()) {
            Ok(n) => {
                if n < buf.len() {
                    debug!("Short write: {} of {} bytes", n, buf.len());
                } else {
                    trace!("Bulk OUT sent {} bytes", n);
                }
                Ok(n)
            }
            Err(e) => {
                warn!("Error writing {} bytes: {}", buf.len(), e);
                Ok(0)
            }
        }
    }

    /// Read a single byte; `None` when nothing arrived before the timeout
    pub fn get(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            1 => Ok(Some(byte[0])),
            _ => Ok(None),
        }
    }

    /// Write a single byte
    pub fn put(&mut self, byte: u8) -> Result<usize> {
        self.write(&[byte])
    }

    /// Give pending OUT data a chance to drain
    ///
    /// There is no flush request at this level; this waits one USB polling
    /// interval, which is usually but not always enough.
    pub fn flush(&self) {
        std::thread::sleep(FLUSH_DELAY);
    }

    /// Bound for each bulk IN transfer; zero blocks indefinitely
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Store the auto-flush hint for higher layers; reads and writes ignore it
    pub fn set_auto_flush(&mut self, auto_flush: bool) {
        self.auto_flush = auto_flush;
    }

    pub fn auto_flush(&self) -> bool {
        self.auto_flush
    }
}

/// A timed-out read with nothing received reads as end of stream
impl<B: UsbBackend> io::Read for SerialSession<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(SerialSession::read(self, buf)?)
    }
}

impl<B: UsbBackend> io::Write for SerialSession<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(SerialSession::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        SerialSession::flush(self);
        Ok(())
    }
}
