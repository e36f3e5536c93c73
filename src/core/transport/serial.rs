//! Serial transport for Bluetooth RFCOMM nodes and USB adapters.

use super::{TransportError, TransportKind, TransportTrait};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Read window for a single flow-control byte. Short, so a cancelled
/// playback session never sits on a silent link for long.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial link over one OS port.
///
/// The controller speaks 8N1 at a fixed baud rate; no parity or flow-control
/// settings are exposed.
pub struct SerialLink {
    kind: TransportKind,
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    /// Create an unconnected link for a named port.
    pub fn new(kind: TransportKind, port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            kind,
            port_name: port_name.into(),
            baud_rate,
            port: None,
        }
    }
}

#[async_trait]
impl TransportTrait for SerialLink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| map_open_error(&self.port_name, &e))?;

        self.port = Some(port);
        info!(port = %self.port_name, baud = self.baud_rate, "serial link open");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.port = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn poll_ready(&mut self) -> Result<Option<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;

        let mut buffer = [0u8; 1];
        match port.read(&mut buffer) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(_) => Ok(Some(buffer[0])),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // No flow-control byte within the window.
                Ok(None)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    async fn write_command(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;

        port.write_all(frame)?;
        port.flush()?;
        debug!(
            port = %self.port_name,
            frame = %String::from_utf8_lossy(frame),
            "frame written"
        );
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn connection_info(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

fn map_open_error(port: &str, error: &serialport::Error) -> TransportError {
    match error.kind() {
        serialport::ErrorKind::NoDevice => TransportError::PortNotFound(port.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            TransportError::PermissionDenied(port.to_string())
        }
        _ => TransportError::ConnectionFailed(error.to_string()),
    }
}

/// List serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::ConnectionFailed(e.to_string()))
}
