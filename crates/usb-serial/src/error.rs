//! Serial session error types

use common::BackendError;
use protocol::ProtocolError;
use thiserror::Error;

/// Errors returned by session and stream operations
///
/// Short reads and short writes are not errors; they are reported through
/// byte counts. Only failures that leave the session unusable, or that the
/// caller asked to be strict about, surface here.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `open()` called on a session that is already open
    #[error("Session is already open")]
    AlreadyOpen,

    /// Operation needs an open session
    #[error("Session is not open")]
    NotOpen,

    /// Context setup or descriptor binding failed
    #[error("Failed to open device: {0}")]
    Backend(#[from] BackendError),

    /// Caller supplied line settings the device cannot represent
    #[error("Invalid line settings: {0}")]
    Line(#[from] ProtocolError),

    /// Strict open policy rejected a partially configured device
    ///
    /// `release` lists interfaces that stayed claimed while the device was
    /// being let go.
    #[error(
        "Device configuration incomplete: {} issue(s), {} release failure(s)",
        .issues.len(),
        .release.len()
    )]
    Degraded {
        issues: Vec<OpenIssue>,
        release: Vec<ReleaseFailure>,
    },

    /// One or more interfaces could not be released on close
    #[error("Failed to release {} interface(s)", .0.len())]
    Release(Vec<ReleaseFailure>),

    /// A class request issued on an open session failed
    #[error("Control request {request:#04x} failed: {source}")]
    Control {
        request: u8,
        #[source]
        source: rusb::Error,
    },
}

/// A non-fatal problem met while configuring the device on open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpenIssue {
    /// A bound kernel driver could not be detached
    #[error("detach kernel driver from interface {interface}: {error}")]
    KernelDriver { interface: u8, error: rusb::Error },

    /// An interface could not be claimed
    #[error("claim interface {interface}: {error}")]
    ClaimInterface { interface: u8, error: rusb::Error },

    /// A class control transfer was not accepted
    #[error("control request {request:#04x}: {error}")]
    ControlTransfer { request: u8, error: rusb::Error },
}

/// An interface that could not be released on close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("release interface {interface}: {error}")]
pub struct ReleaseFailure {
    pub interface: u8,
    pub error: rusb::Error,
}

/// Type alias for session results
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for std::io::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotOpen => std::io::Error::new(std::io::ErrorKind::NotConnected, err),
            other => std::io::Error::other(other),
        }
    }
}
