//! Integration tests for stream I/O over the bulk endpoints
//!
//! Covers read accumulation and early return on timeout, the retry budget
//! for transfer errors, single-shot writes with short counts, the single
//! byte helpers, timeout propagation and the `std::io` adapters.

use common::test_utils::{MockBackend, MockRead};
use protocol::LineSettings;
use protocol::cdc::{READ_ENDPOINT, WRITE_ENDPOINT};
use std::io;
use std::time::{Duration, Instant};
use usb_serial::{MAX_READ_ERROR_BUDGET, ReadState, SerialPort, SerialSession, SessionSettings};

fn open_session(backend: &MockBackend) -> SerialSession<MockBackend> {
    open_session_with(backend, SessionSettings::default())
}

fn open_session_with(
    backend: &MockBackend,
    settings: SessionSettings,
) -> SerialSession<MockBackend> {
    let mut port = SerialSession::with_backend(backend.clone(), 4, false, settings);
    port.open(LineSettings::default()).unwrap();
    port
}

mod read {
    use super::*;

    #[test]
    fn test_twenty_bytes_then_timeout() {
        let backend = MockBackend::new();
        let delivered: Vec<u8> = (0..20).collect();
        backend.push_read(MockRead::Data(delivered.clone()));
        backend.push_read(MockRead::Timeout);
        let mut port = open_session(&backend);

        let mut buf = [0u8; 64];
        let n = port.read(&mut buf).unwrap();
        assert_eq!(n, 20);
        assert_eq!(&buf[..20], delivered.as_slice());
    }

    #[test]
    fn test_accumulates_across_transfers() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(b"hel".to_vec()));
        backend.push_read(MockRead::Data(b"lo ".to_vec()));
        backend.push_read(MockRead::Data(b"world".to_vec()));
        let mut port = open_session(&backend);

        let mut buf = [0u8; 11];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 11);
        assert_eq!(report.state, ReadState::Filled);
        assert_eq!(&buf, b"hello world");
        assert_eq!(backend.state().read_timeouts.len(), 3);
    }

    #[test]
    fn test_never_exceeds_requested_length() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![0xaa; 100]));
        let mut port = open_session(&backend);

        let mut buf = [0u8; 16];
        assert_eq!(port.read(&mut buf).unwrap(), 16);

        // The remainder is still queued for the next read
        let mut rest = [0u8; 128];
        assert_eq!(port.read(&mut rest).unwrap(), 84);
    }

    #[test]
    fn test_timeout_with_no_data() {
        let backend = MockBackend::new();
        let mut port = open_session(&backend);

        let mut buf = [0u8; 8];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.state, ReadState::TimedOut);
    }

    #[test]
    fn test_full_read_does_not_wait_for_timeout() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![1, 2, 3, 4]));
        backend.push_read(MockRead::Timeout);
        let mut port = open_session(&backend);

        let mut buf = [0u8; 4];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.state, ReadState::Filled);
        // Only one transfer issued; the queued timeout is untouched
        assert_eq!(backend.state().read_timeouts.len(), 1);
        assert_eq!(backend.state().reads.len(), 1);
    }

    #[test]
    fn test_uses_read_endpoint_and_session_timeout() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![1]));
        backend.push_read(MockRead::Data(vec![2]));
        let mut port = open_session(&backend);

        port.set_timeout(Duration::from_millis(123));
        let mut buf = [0u8; 4];
        port.read(&mut buf).unwrap();

        let state = backend.state();
        assert!(state.read_endpoints.iter().all(|&ep| ep == READ_ENDPOINT));
        assert_eq!(
            state.read_timeouts,
            vec![Duration::from_millis(123); 3]
        );
    }

    #[test]
    fn test_default_timeout_blocks_indefinitely() {
        let backend = MockBackend::new();
        let mut port = open_session(&backend);

        let mut buf = [0u8; 1];
        port.read(&mut buf).unwrap();
        assert_eq!(backend.state().read_timeouts, vec![Duration::ZERO]);
    }

    #[test]
    fn test_timeout_change_applies_to_next_read() {
        let backend = MockBackend::new();
        let mut port = open_session(&backend);

        let mut buf = [0u8; 1];
        port.set_timeout(Duration::from_millis(10));
        port.read(&mut buf).unwrap();
        port.set_timeout(Duration::from_millis(20));
        port.read(&mut buf).unwrap();

        assert_eq!(
            backend.state().read_timeouts,
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![1, 2]));
        backend.push_read(MockRead::Error(rusb::Error::Overflow));
        backend.push_read(MockRead::Error(rusb::Error::Io));
        backend.push_read(MockRead::Data(vec![3, 4]));
        let mut port = open_session(&backend);

        let mut buf = [0u8; 4];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 4);
        assert_eq!(report.state, ReadState::Filled);
        assert_eq!(report.errors, 2);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_error_budget_ends_read() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![7]));
        for _ in 0..10 {
            backend.push_read(MockRead::Error(rusb::Error::Pipe));
        }
        let settings = SessionSettings {
            read_error_budget: 2,
            ..SessionSettings::default()
        };
        let mut port = open_session_with(&backend, settings);

        let mut buf = [0u8; 8];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.state, ReadState::Errored);
        assert_eq!(report.errors, 3);
        // One data transfer plus three failed ones
        assert_eq!(backend.state().read_timeouts.len(), 4);
    }

    #[test]
    fn test_zero_budget_stops_at_first_error() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Error(rusb::Error::Pipe));
        backend.push_read(MockRead::Data(vec![1]));
        let settings = SessionSettings {
            read_error_budget: 0,
            ..SessionSettings::default()
        };
        let mut port = open_session_with(&backend, settings);

        let mut buf = [0u8; 1];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.state, ReadState::Errored);
    }

    #[test]
    fn test_oversized_budget_is_clamped() {
        // Retry warnings must be emitted for the attempt count to be formatted
        let _ = common::setup_logging("warn");

        let backend = MockBackend::new();
        for _ in 0..=MAX_READ_ERROR_BUDGET {
            backend.push_read(MockRead::Error(rusb::Error::Pipe));
        }
        backend.push_read(MockRead::Data(vec![9]));
        let settings = SessionSettings {
            read_error_budget: u32::MAX,
            ..SessionSettings::default()
        };
        let mut port = open_session_with(&backend, settings);

        let mut buf = [0u8; 4];
        let report = port.read_report(&mut buf).unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.state, ReadState::Errored);
        assert_eq!(report.errors, MAX_READ_ERROR_BUDGET + 1);
        // The queued data transfer was never reached
        assert_eq!(
            backend.state().read_timeouts.len() as u32,
            MAX_READ_ERROR_BUDGET + 1
        );
    }
}

mod write {
    use super::*;

    #[test]
    fn test_single_transfer_with_fixed_timeout() {
        let backend = MockBackend::new();
        let mut port = open_session(&backend);
        port.set_timeout(Duration::from_millis(5));

        assert_eq!(port.write(b"ping").unwrap(), 4);

        let state = backend.state();
        assert_eq!(state.written, b"ping");
        assert_eq!(state.write_endpoints, vec![WRITE_ENDPOINT]);
        assert_eq!(state.write_timeouts, vec![Duration::from_millis(1000)]);
    }

    #[test]
    fn test_short_write_is_not_retried() {
        let backend = MockBackend::new();
        backend.state_mut().write_limit = Some(3);
        let mut port = open_session(&backend);

        assert_eq!(port.write(b"abcdef").unwrap(), 3);
        let state = backend.state();
        assert_eq!(state.written, b"abc");
        assert_eq!(state.write_timeouts.len(), 1);
    }

    #[test]
    fn test_failed_write_reports_zero() {
        let backend = MockBackend::new();
        backend.state_mut().write_error = Some(rusb::Error::Timeout);
        let mut port = open_session(&backend);

        assert_eq!(port.write(b"abc").unwrap(), 0);
    }

    #[test]
    fn test_write_all_loops_over_short_writes() {
        let backend = MockBackend::new();
        backend.state_mut().write_limit = Some(2);
        let mut port = open_session(&backend);

        io::Write::write_all(&mut port, b"hello").unwrap();
        let state = backend.state();
        assert_eq!(state.written, b"hello");
        assert_eq!(state.write_timeouts.len(), 3);
    }

    #[test]
    fn test_write_all_fails_when_device_stalls() {
        let backend = MockBackend::new();
        backend.state_mut().write_error = Some(rusb::Error::Pipe);
        let mut port = open_session(&backend);

        let err = io::Write::write_all(&mut port, b"x").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WriteZero);
    }
}

mod single_byte {
    use super::*;

    #[test]
    fn test_get_returns_byte() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![0x41, 0x42]));
        let mut port = open_session(&backend);

        assert_eq!(port.get().unwrap(), Some(0x41));
        assert_eq!(port.get().unwrap(), Some(0x42));
    }

    #[test]
    fn test_get_none_on_timeout() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Timeout);
        let mut port = open_session(&backend);

        assert_eq!(port.get().unwrap(), None);
    }

    #[test]
    fn test_get_matches_single_byte_read() {
        let scripts = [
            vec![MockRead::Data(vec![9])],
            vec![MockRead::Timeout],
            vec![MockRead::Error(rusb::Error::NoDevice)],
        ];

        for script in scripts {
            let via_read = MockBackend::new();
            let via_get = MockBackend::new();
            for step in &script {
                via_read.push_read(step.clone());
                via_get.push_read(step.clone());
            }

            let mut reader = open_session(&via_read);
            let mut getter = open_session(&via_get);

            let mut buf = [0u8; 1];
            let n = reader.read(&mut buf).unwrap();
            let byte = getter.get().unwrap();
            assert_eq!(byte.is_none(), n == 0);
            if let Some(b) = byte {
                assert_eq!(b, buf[0]);
            }
        }
    }

    #[test]
    fn test_put_is_single_byte_write() {
        let backend = MockBackend::new();
        let mut port = open_session(&backend);

        assert_eq!(port.put(b'Z').unwrap(), 1);
        let state = backend.state();
        assert_eq!(state.written, b"Z");
        assert_eq!(state.write_endpoints, vec![WRITE_ENDPOINT]);
    }
}

mod adapters {
    use super::*;

    #[test]
    fn test_flush_waits_a_polling_interval() {
        let backend = MockBackend::new();
        let port = open_session(&backend);

        let start = Instant::now();
        port.flush();
        assert!(start.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn test_io_read() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(b"abc".to_vec()));
        let mut port = open_session(&backend);

        let mut out = Vec::new();
        // Timeout with nothing pending reads as end of stream
        io::Read::read_to_end(&mut port, &mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_io_on_closed_session() {
        let backend = MockBackend::new();
        let mut port =
            SerialSession::with_backend(backend, 4, false, SessionSettings::default());

        let mut buf = [0u8; 1];
        let err = io::Read::read(&mut port, &mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_through_trait_object() {
        let backend = MockBackend::new();
        backend.push_read(MockRead::Data(vec![5, 6]));
        let mut port: Box<dyn SerialPort> = Box::new(SerialSession::with_backend(
            backend.clone(),
            4,
            true,
            SessionSettings::default(),
        ));

        assert!(port.is_trick());
        port.open(LineSettings::new(57600)).unwrap();
        port.set_timeout(Duration::from_millis(30));
        port.set_auto_flush(true);

        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(port.put(1).unwrap(), 1);
        port.flush();
        port.close().unwrap();

        let state = backend.state();
        assert_eq!(state.read_timeouts[0], Duration::from_millis(30));
        assert_eq!(state.closed, 1);
    }
}
