//! Ordered-probe connection management and the active link.
//!
//! The manager walks a caller-supplied candidate list, keeps the first
//! transport that opens, and owns it for the rest of its life. Probe
//! failures are events, not process faults. Any I/O error on the active
//! link invalidates it immediately; reconnection is the caller's call.

use crate::core::event::{ControllerEvent, ErrorCategory};
use crate::core::transport::{
    create_transport, DebugLink, Transport, TransportError, TransportKind, TransportTrait,
};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Connection errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// No candidate in the probe list opened
    #[error("no responsive device among the probed candidates")]
    NoDeviceFound,

    /// A healthy transport is already active
    #[error("a transport is already open")]
    AlreadyOpen,
}

/// Explicit connection state, observed instead of inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No healthy transport
    Disconnected,
    /// A healthy transport of the given medium is active
    Connected(TransportKind),
}

impl ConnectionState {
    /// True when a healthy transport is active
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Medium of the active transport, if any
    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            Self::Connected(kind) => Some(*kind),
            Self::Disconnected => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected(kind) => write!(f, "connected ({})", kind),
        }
    }
}

/// The one open transport, shared between the dispatcher and at most one
/// playback worker.
///
/// All I/O goes through the inner async mutex, so command frames from the
/// immediate path and the playback path can never interleave mid-frame. A
/// running playback session additionally claims the link, and the immediate
/// path tests the claim under that same mutex, so an immediate frame can
/// never land inside a session's stream either. The first I/O fault flips
/// the health flag once and announces it.
pub struct ActiveLink {
    kind: TransportKind,
    io: tokio::sync::Mutex<Box<dyn TransportTrait>>,
    healthy: AtomicBool,
    claimed: AtomicBool,
    events: broadcast::Sender<ControllerEvent>,
}

impl ActiveLink {
    pub(crate) fn new(
        transport: Box<dyn TransportTrait>,
        events: broadcast::Sender<ControllerEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind: transport.kind(),
            io: tokio::sync::Mutex::new(transport),
            healthy: AtomicBool::new(true),
            claimed: AtomicBool::new(false),
            events,
        })
    }

    /// Medium of this link
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// True until the first I/O fault
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// True while a playback session holds the link
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Reserve the link for a playback session.
    pub(crate) fn claim(&self) {
        self.claimed.store(true, Ordering::SeqCst);
    }

    /// Hand the link back to the immediate path.
    pub(crate) fn release(&self) {
        self.claimed.store(false, Ordering::SeqCst);
    }

    /// Read one flow-control byte; `None` when the window passed silently.
    pub async fn poll_ready(&self) -> Result<Option<u8>, TransportError> {
        let mut io = self.io.lock().await;
        match io.poll_ready().await {
            Ok(byte) => Ok(byte),
            Err(err) => {
                drop(io);
                self.invalidate();
                Err(err)
            }
        }
    }

    /// Write one complete command frame.
    pub async fn write_command(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut io = self.io.lock().await;
        match io.write_command(frame).await {
            Ok(()) => Ok(()),
            Err(err) => {
                drop(io);
                self.invalidate();
                Err(err)
            }
        }
    }

    /// Write one frame unless a playback session has claimed the link.
    ///
    /// The claim is tested under the same io lock the playback worker
    /// writes through. `Ok(false)` means the claim was held and nothing
    /// was written.
    pub async fn write_if_unclaimed(&self, frame: &[u8]) -> Result<bool, TransportError> {
        let mut io = self.io.lock().await;
        if self.claimed.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match io.write_command(frame).await {
            Ok(()) => Ok(true),
            Err(err) => {
                drop(io);
                self.invalidate();
                Err(err)
            }
        }
    }

    /// Mark the link unusable. Announced once, idempotent afterwards.
    pub fn invalidate(&self) {
        if self
            .healthy
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            warn!(kind = %self.kind, "active link invalidated");
            let _ = self.events.send(ControllerEvent::ConnectionChanged {
                kind: self.kind,
                active: false,
            });
        }
    }
}

/// Probes transport candidates in order and owns the active link.
pub struct ConnectionManager {
    baud_rate: u32,
    active: RwLock<Option<Arc<ActiveLink>>>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ConnectionManager {
    /// Manager with no active transport.
    pub fn new(baud_rate: u32, events: broadcast::Sender<ControllerEvent>) -> Self {
        Self {
            baud_rate,
            active: RwLock::new(None),
            events,
        }
    }

    /// Try each candidate strictly in order and keep the first that opens.
    ///
    /// Later candidates are never attempted once one opens. Each failed
    /// candidate is logged and reported as an [`ControllerEvent::Error`].
    /// Fails with [`ConnectionError::AlreadyOpen`] while a healthy link is
    /// active, and [`ConnectionError::NoDeviceFound`] when the whole list
    /// is exhausted.
    pub async fn open(&self, candidates: &[Transport]) -> Result<TransportKind, ConnectionError> {
        let baud_rate = self.baud_rate;
        self.probe(candidates, |candidate| create_transport(candidate, baud_rate))
            .await
    }

    /// Install the synthetic debug link, replacing whatever was active.
    ///
    /// Never fails; the returned kind is always [`TransportKind::Debug`].
    pub async fn open_debug(&self) -> TransportKind {
        let mut transport: Box<dyn TransportTrait> = Box::new(DebugLink::new());
        // The debug link cannot fail to attach.
        transport.connect().await.ok();
        let link = ActiveLink::new(transport, self.events.clone());
        let kind = link.kind();
        *self.active.write() = Some(link);
        warn!("debug transport active, frames will not reach hardware");
        let _ = self.events.send(ControllerEvent::ConnectionChanged { kind, active: true });
        kind
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        match self.active.read().as_ref() {
            Some(link) if link.is_healthy() => ConnectionState::Connected(link.kind()),
            _ => ConnectionState::Disconnected,
        }
    }

    /// Shared handle to the healthy active link, if there is one.
    pub fn active(&self) -> Option<Arc<ActiveLink>> {
        self.active
            .read()
            .as_ref()
            .filter(|link| link.is_healthy())
            .cloned()
    }

    async fn probe<F>(
        &self,
        candidates: &[Transport],
        mut opener: F,
    ) -> Result<TransportKind, ConnectionError>
    where
        F: FnMut(&Transport) -> Box<dyn TransportTrait>,
    {
        if self.state().is_connected() {
            return Err(ConnectionError::AlreadyOpen);
        }

        for candidate in candidates {
            let mut transport = opener(candidate);
            match transport.connect().await {
                Ok(()) => {
                    let link = ActiveLink::new(transport, self.events.clone());
                    let kind = link.kind();
                    *self.active.write() = Some(link);
                    info!(transport = %candidate, "connection established");
                    let _ = self
                        .events
                        .send(ControllerEvent::ConnectionChanged { kind, active: true });
                    return Ok(kind);
                }
                Err(err) => {
                    warn!(transport = %candidate, error = %err, "candidate did not open");
                    let _ = self.events.send(ControllerEvent::Error {
                        kind: ErrorCategory::Connection,
                        message: format!("{}: {}", candidate, err),
                    });
                }
            }
        }

        Err(ConnectionError::NoDeviceFound)
    }
}
