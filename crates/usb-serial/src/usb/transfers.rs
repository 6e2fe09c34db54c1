//! Transfer error classification
//!
//! Bulk transfers report every failure as an `rusb::Error`. The stream layer
//! only needs to know which of three things happened.

use rusb::Error;

/// How a failed transfer affects the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer ran out of time; whatever arrived so far is the result
    Timeout,
    /// The device is gone; retrying cannot succeed
    Disconnected,
    /// Anything else; the transfer may be retried
    Transient,
}

/// Classify a transfer error
pub fn classify(err: Error) -> TransferOutcome {
    match err {
        Error::Timeout => TransferOutcome::Timeout,
        Error::NoDevice | Error::NotFound => TransferOutcome::Disconnected,
        _ => TransferOutcome::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Error::Timeout), TransferOutcome::Timeout);
        assert_eq!(classify(Error::NoDevice), TransferOutcome::Disconnected);
        assert_eq!(classify(Error::NotFound), TransferOutcome::Disconnected);
        assert_eq!(classify(Error::Pipe), TransferOutcome::Transient);
        assert_eq!(classify(Error::Overflow), TransferOutcome::Transient);
        assert_eq!(classify(Error::Io), TransferOutcome::Transient);
    }
}
