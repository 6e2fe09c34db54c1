//! CDC-ACM class constants
//!
//! Request codes and addresses used on the control and bulk pipes of a
//! CDC-ACM function. Values must match the device class byte for byte.

use std::time::Duration;

/// Configures baud rate, stop bits, parity and character size
pub const SET_LINE_CODING: u8 = 0x20;

/// Requests the current baud rate, stop bits, parity and character size
pub const GET_LINE_CODING: u8 = 0x21;

/// RS-232 control lines (DTR/RTS); tells the DCE that a DTE is present
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;

/// Emits an RS-232 break for the given number of milliseconds
pub const SEND_BREAK: u8 = 0x23;

/// Host-to-device, class request, interface recipient
pub const REQUEST_TYPE_OUT: u8 = 0x21;

/// Device-to-host, class request, interface recipient
pub const REQUEST_TYPE_IN: u8 = 0xA1;

/// Bulk IN endpoint of the data interface
pub const READ_ENDPOINT: u8 = 0x81;

/// Bulk OUT endpoint of the data interface
pub const WRITE_ENDPOINT: u8 = 0x02;

/// Communications (control) interface number
pub const CONTROL_INTERFACE: u8 = 0;

/// Data interface number
pub const DATA_INTERFACE: u8 = 1;

/// Interfaces claimed on open, in claim order
pub const INTERFACES: [u8; 2] = [CONTROL_INTERFACE, DATA_INTERFACE];

/// Data Terminal Ready bit of `SET_CONTROL_LINE_STATE`
pub const ACM_CTRL_DTR: u16 = 0x01;

/// Request To Send bit of `SET_CONTROL_LINE_STATE`
pub const ACM_CTRL_RTS: u16 = 0x02;

/// Bound applied to every class control transfer
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Bound applied to every bulk OUT transfer
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Approximate drain time for pending OUT data (one USB polling interval)
pub const FLUSH_DELAY: Duration = Duration::from_millis(1);

/// Build the `wValue` of `SET_CONTROL_LINE_STATE` from the two output lines
pub fn control_line_state(dtr: bool, rts: bool) -> u16 {
    let mut value = 0;
    if dtr {
        value |= ACM_CTRL_DTR;
    }
    if rts {
        value |= ACM_CTRL_RTS;
    }
    value
}
