//! Send a line over a descriptor-backed serial port and print the reply
//!
//! The descriptor must already be open and permission-granted, typically
//! inherited from the process that launched this one.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};
use usb_serial::config::{PortConfig, load_config};
use usb_serial::{FdPortFactory, PortFactory};

#[derive(Parser, Debug)]
#[command(name = "usb-serial-echo")]
#[command(about = "Write to a USB CDC-ACM descriptor and dump what comes back")]
struct Args {
    /// Open USB device descriptor supplied by the platform
    fd: i32,

    /// Mark the descriptor as pre-authorized
    #[arg(long)]
    trick: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Baud rate (overrides the configuration file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Text to send; a trailing CR LF is appended
    #[arg(short, long, default_value = "AT")]
    message: String,

    /// Read timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => load_config(path).context("Failed to load configuration")?,
        None => PortConfig::load_or_default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    let mut line = config.line;
    if let Some(baud) = args.baud {
        line.baud_rate = baud;
    }

    let factory = FdPortFactory::from_config(&config);
    let mut port = factory.create(args.fd, args.trick);

    let report = port.open(line).context("Failed to open port")?;
    if let Some((vendor_id, product_id)) = report.device_ids {
        info!("Device {:04x}:{:04x}", vendor_id, product_id);
    }
    for issue in &report.issues {
        warn!("Open: {}", issue);
    }

    port.set_timeout(Duration::from_millis(args.timeout_ms));

    let mut payload = args.message.into_bytes();
    payload.extend_from_slice(b"\r\n");
    port.write_all(&payload).context("Failed to send message")?;
    port.flush();

    let mut buf = [0u8; 256];
    loop {
        let n = port.read(&mut buf)?;
        if n == 0 {
            break;
        }
        println!("{}", String::from_utf8_lossy(&buf[..n]));
        if n < buf.len() {
            break;
        }
    }

    port.close().context("Failed to close port")?;
    Ok(())
}
