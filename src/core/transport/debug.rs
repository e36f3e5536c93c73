//! Synthetic debug link.
//!
//! Stands in for the arm when no hardware is attached: reads produce the
//! ready byte most of the time, writes are logged and discarded. Tagged
//! [`TransportKind::Debug`] so callers can never mistake it for a real
//! link.

use super::{TransportError, TransportKind, TransportTrait, READY_BYTE};
use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

/// Byte returned when the synthetic controller pretends to be busy
const BUSY_BYTE: u8 = b'1';

/// Hardware-free transport for exercising the playback engine.
#[derive(Debug, Default)]
pub struct DebugLink {
    connected: bool,
}

impl DebugLink {
    /// Create an unconnected debug link.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransportTrait for DebugLink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        info!("debug link attached");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn poll_ready(&mut self) -> Result<Option<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        // Ready nine times out of ten, busy otherwise.
        let byte = if rand::thread_rng().gen_ratio(9, 10) {
            READY_BYTE
        } else {
            BUSY_BYTE
        };
        Ok(Some(byte))
    }

    async fn write_command(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        debug!(frame = %String::from_utf8_lossy(frame), "debug link consumed frame");
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Debug
    }

    fn connection_info(&self) -> String {
        "debug (synthetic ready source)".to_string()
    }
}
