//! Engine-to-caller event surface.
//!
//! Events flow over a tokio broadcast channel so the playback worker never
//! blocks on a slow or absent subscriber.

use crate::core::command::Command;
use crate::core::playback::PlaybackStatus;
use crate::core::transport::TransportKind;
use std::fmt;
use tokio::sync::broadcast;

/// Broadcast channel depth for controller events
pub const EVENT_CAPACITY: usize = 1024;

/// Which part of the engine raised an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Probing or holding the transport
    Connection,
    /// A running playback session
    Playback,
    /// The immediate-command path
    Dispatch,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Playback => f.write_str("playback"),
            Self::Dispatch => f.write_str("dispatch"),
        }
    }
}

/// Events observable by the UI/CLI layer.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The active transport changed, or the active link went away
    ConnectionChanged {
        /// Medium of the link in question
        kind: TransportKind,
        /// True on open, false on invalidation
        active: bool,
    },
    /// An immediate command was written to the link
    CommandSent(Command),
    /// Playback advanced; fraction of lines sent so far, in `[0, 1]`
    PlaybackProgress(f32),
    /// A playback session reached a terminal state
    PlaybackFinished(PlaybackStatus),
    /// A non-fatal fault, reported rather than raised
    Error {
        /// Originating part of the engine
        kind: ErrorCategory,
        /// Human-readable description
        message: String,
    },
}

/// Create the controller event channel.
pub fn event_channel() -> broadcast::Sender<ControllerEvent> {
    let (tx, _) = broadcast::channel(EVENT_CAPACITY);
    tx
}
