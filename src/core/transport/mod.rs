//! Transport layer for the arm link
//!
//! Supports:
//! - Bluetooth RFCOMM serial device nodes
//! - USB serial adapters addressed by index
//! - A synthetic debug link for exercising playback without hardware
//!
//! The controller is half-duplex: it emits a single flow-control byte when
//! it will accept the next command, and anything else it says means "not
//! yet".

mod debug;
mod serial;

pub use debug::DebugLink;
pub use serial::{list_ports, SerialLink};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Flow-control byte announcing the controller is ready for a command
pub const READY_BYTE: u8 = b'0';

/// Transport candidate descriptor, as held in config and probe lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    /// Bluetooth RFCOMM serial node, e.g. `/dev/rfcomm0`
    Bluetooth {
        /// Device node path
        device: String,
    },
    /// USB serial adapter by enumeration index
    Usb {
        /// Adapter index, mapped to a per-OS port name
        index: u32,
    },
    /// Synthetic link, no hardware involved
    Debug,
}

impl Transport {
    /// Medium tag for this descriptor
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Bluetooth { .. } => TransportKind::Bluetooth,
            Self::Usb { .. } => TransportKind::Usb,
            Self::Debug => TransportKind::Debug,
        }
    }

    /// Resolve the descriptor to an OS port name, if it has one.
    pub fn port_name(&self) -> Option<String> {
        match self {
            Self::Bluetooth { device } => Some(device.clone()),
            Self::Usb { index } => {
                if cfg!(windows) {
                    Some(format!("COM{}", index))
                } else {
                    Some(format!("/dev/ttyUSB{}", index))
                }
            }
            Self::Debug => None,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bluetooth { device } => write!(f, "bluetooth {}", device),
            Self::Usb { index } => match self.port_name() {
                Some(name) => write!(f, "usb {} ({})", index, name),
                None => write!(f, "usb {}", index),
            },
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// Medium tag of an open transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Bluetooth RFCOMM serial
    Bluetooth,
    /// USB serial adapter
    Usb,
    /// Synthetic debug link
    Debug,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bluetooth => f.write_str("bluetooth"),
            Self::Usb => f.write_str("usb"),
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port not found
    #[error("port {0} not found")]
    PortNotFound(String),

    /// Permission denied
    #[error("permission denied opening {0}")]
    PermissionDenied(String),

    /// Port refused to open for another reason
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation attempted before `connect`
    #[error("transport not connected")]
    NotConnected,

    /// Peer closed the stream
    #[error("link disconnected")]
    Disconnected,

    /// Underlying I/O fault
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-stream transport the engine drives.
///
/// Implementations hold at most one open handle. `poll_ready` returns
/// `Ok(None)` when no flow-control byte arrived within the link's short
/// read window, which keeps the playback loop's cancel latency bounded.
#[async_trait]
pub trait TransportTrait: Send {
    /// Open the underlying stream.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the underlying stream. Idempotent.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Check if the stream is currently open
    fn is_connected(&self) -> bool;

    /// Read one flow-control byte if the controller sent one.
    async fn poll_ready(&mut self) -> Result<Option<u8>, TransportError>;

    /// Write one complete command frame.
    async fn write_command(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Medium tag of this transport
    fn kind(&self) -> TransportKind;

    /// Short human-readable description for logs
    fn connection_info(&self) -> String;
}

/// Create the transport for a candidate descriptor. The handle is not yet
/// connected.
pub fn create_transport(descriptor: &Transport, baud_rate: u32) -> Box<dyn TransportTrait> {
    match descriptor {
        Transport::Bluetooth { device } => Box::new(SerialLink::new(
            TransportKind::Bluetooth,
            device.clone(),
            baud_rate,
        )),
        Transport::Usb { index } => {
            let name = Transport::Usb { index: *index }
                .port_name()
                .unwrap_or_default();
            Box::new(SerialLink::new(TransportKind::Usb, name, baud_rate))
        }
        Transport::Debug => Box::new(DebugLink::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_kinds() {
        let bt = Transport::Bluetooth {
            device: "/dev/rfcomm0".to_string(),
        };
        assert_eq!(bt.kind(), TransportKind::Bluetooth);
        assert_eq!(Transport::Usb { index: 3 }.kind(), TransportKind::Usb);
        assert_eq!(Transport::Debug.kind(), TransportKind::Debug);
    }

    #[test]
    fn test_usb_port_name_is_indexed() {
        let name = Transport::Usb { index: 3 }.port_name().unwrap();
        assert!(name.ends_with('3'));
        assert_eq!(Transport::Debug.port_name(), None);
    }

    #[test]
    fn test_descriptor_toml_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            candidates: Vec<Transport>,
        }
        let wrapper = Wrapper {
            candidates: vec![
                Transport::Bluetooth {
                    device: "/dev/rfcomm0".to_string(),
                },
                Transport::Usb { index: 0 },
                Transport::Debug,
            ],
        };
        let text = toml::to_string(&wrapper).unwrap();
        assert!(text.contains("type = \"bluetooth\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.candidates, wrapper.candidates);
    }

    #[test]
    fn test_factory_builds_unconnected_handles() {
        let link = create_transport(&Transport::Debug, 9600);
        assert_eq!(link.kind(), TransportKind::Debug);
        assert!(!link.is_connected());
    }
}
