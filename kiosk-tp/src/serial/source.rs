//! Serial port source with reconnect
//!
//! Read errors are classified before deciding what to do:
//! - interrupted / would-block / timed-out reads are retried in place
//! - end of stream and any other I/O error close the port and reconnect
//!   with exponential backoff
//! - running out of reconnect attempts is fatal and ends the tag pipeline

use super::parser::{TagReader, TagScan};
use kiosk_common::config::ReconnectConfig;
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("serial port {port} unavailable after {attempts} reconnect attempts")]
    Fatal { port: String, attempts: u32 },
}

/// Opens the byte stream the tag reader consumes
pub trait PortOpener: Send {
    type Port: AsyncRead + Unpin + Send;

    /// Human-readable port name for logs
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<Self::Port, SerialError>;
}

/// Opens a real serial device at 8 data bits, no parity, one stop bit
pub struct SerialPortOpener {
    port: String,
    baud_rate: u32,
}

impl SerialPortOpener {
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
        }
    }
}

impl PortOpener for SerialPortOpener {
    type Port = tokio_serial::SerialStream;

    fn name(&self) -> &str {
        &self.port
    }

    fn open(&mut self) -> Result<Self::Port, SerialError> {
        tokio_serial::new(self.port.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| SerialError::Open {
                port: self.port.clone(),
                reason: e.to_string(),
            })
    }
}

/// Errors worth retrying on the same open port
pub fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Delay before reconnect attempt number `attempt` (1-based)
pub fn backoff_delay(policy: &ReconnectConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let delay = policy.initial_backoff_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(policy.max_backoff_ms))
}

/// Read scans from the port and forward them until cancelled
///
/// Returns `Ok(())` on cancellation or when the receiving side is gone, and
/// `SerialError::Fatal` once `policy.max_attempts` consecutive reopen attempts
/// have failed.
pub async fn pump_scans<O: PortOpener>(
    mut opener: O,
    buffer_size: usize,
    policy: ReconnectConfig,
    scans: mpsc::Sender<TagScan>,
    cancel: CancellationToken,
) -> Result<(), SerialError> {
    let mut failures: u32 = 0;

    loop {
        let port = match opener.open() {
            Ok(port) => {
                if failures > 0 {
                    info!(port = %opener.name(), attempts = failures, "Serial port reopened");
                } else {
                    info!(port = %opener.name(), "Serial port opened");
                }
                failures = 0;
                port
            }
            Err(e) => {
                failures += 1;
                if failures > policy.max_attempts {
                    error!(port = %opener.name(), error = %e, "Giving up on serial port");
                    return Err(SerialError::Fatal {
                        port: opener.name().to_string(),
                        attempts: failures - 1,
                    });
                }
                let delay = backoff_delay(&policy, failures);
                warn!(
                    port = %opener.name(),
                    error = %e,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    "Failed to open serial port, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };

        let mut reader = TagReader::new(port, buffer_size);
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = reader.next_scan() => next,
            };

            match next {
                Ok(Some(scan)) => {
                    info!(uid = %scan.uid, "Tag scanned");
                    if scans.send(scan).await.is_err() {
                        debug!("Scan receiver closed, stopping serial reader");
                        return Ok(());
                    }
                }
                Ok(None) => {
                    warn!(port = %opener.name(), "Serial stream closed, reconnecting");
                    break;
                }
                Err(e) if is_transient(&e) => {
                    debug!(error = %e, "Transient serial read error, retrying");
                }
                Err(e) => {
                    warn!(port = %opener.name(), error = %e, "Serial read failed, reconnecting");
                    break;
                }
            }
        }

        // Let a flapping device settle before reopening
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(backoff_delay(&policy, 1)) => {}
        }
    }
}
