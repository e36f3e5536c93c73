//! Command dispatch facade.
//!
//! One `Dispatcher` owns the connection manager, the playback engine and the
//! session history, wired to a single event channel. Immediate sends and
//! scripted playback are mutually exclusive: a running session claims the
//! shared link, and immediate frames are refused at the link itself while
//! the claim is held.

use crate::core::command::Command;
use crate::core::connection::{ConnectionError, ConnectionManager, ConnectionState};
use crate::core::event::{event_channel, ControllerEvent};
use crate::core::history::{History, HistoryEntry};
use crate::core::playback::{EngineError, PlaybackConfig, PlaybackEngine, PlaybackState, SessionHandle};
use crate::core::script::{ParseError, Script};
use crate::core::transport::{Transport, TransportError, TransportKind};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

/// Dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No healthy transport is open
    #[error("no active connection")]
    NotConnected,

    /// Playback engine refused the request
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The link failed while carrying the command
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Front door for everything the arm can be asked to do.
pub struct Dispatcher {
    manager: ConnectionManager,
    engine: PlaybackEngine,
    history: RwLock<History>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Dispatcher {
    /// Dispatcher with no connection and an empty history.
    pub fn new(baud_rate: u32, playback: PlaybackConfig) -> Self {
        let events = event_channel();
        Self {
            manager: ConnectionManager::new(baud_rate, events.clone()),
            engine: PlaybackEngine::new(playback, events.clone()),
            history: RwLock::new(History::new()),
            events,
        }
    }

    /// Subscribe to the controller event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Probe candidates in order and keep the first transport that opens.
    pub async fn open(&self, candidates: &[Transport]) -> Result<TransportKind, ConnectionError> {
        self.manager.open(candidates).await
    }

    /// Attach the synthetic debug transport.
    pub async fn open_debug(&self) -> TransportKind {
        self.manager.open_debug().await
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Send one command right now, outside any script.
    ///
    /// Refused while playback is running. Immediate sends skip the ready
    /// handshake; the controller applies them as they land. Each successful
    /// write is recorded in the history and announced on the event stream.
    pub async fn send_immediate(&self, command: Command) -> Result<(), DispatchError> {
        if self.engine.is_playing() {
            return Err(EngineError::AlreadyPlaying.into());
        }
        let link = self.manager.active().ok_or(DispatchError::NotConnected)?;
        // The state check above is a fast path; the claim check inside the
        // link's io lock catches a session that started after it.
        if !link.write_if_unclaimed(command.encode().as_bytes()).await? {
            return Err(EngineError::AlreadyPlaying.into());
        }

        self.history.write().push(command);
        debug!(%command, "command sent");
        let _ = self.events.send(ControllerEvent::CommandSent(command));
        Ok(())
    }

    /// Toggle the claw.
    pub async fn grab(&self) -> Result<(), DispatchError> {
        self.send_immediate(Command::Grab).await
    }

    /// Return every joint to its home posture.
    pub async fn reset(&self) -> Result<(), DispatchError> {
        self.send_immediate(Command::Reset).await
    }

    /// Start scripted playback on the active link.
    pub fn start_playback(&self, script: Script) -> Result<SessionHandle, DispatchError> {
        let link = self.manager.active().ok_or(DispatchError::NotConnected)?;
        Ok(self.engine.start(script, link)?)
    }

    /// Cancel the running playback session.
    pub fn cancel_playback(&self) -> Result<(), DispatchError> {
        Ok(self.engine.cancel()?)
    }

    /// State of the playback engine.
    pub fn playback_state(&self) -> PlaybackState {
        self.engine.state()
    }

    /// Snapshot of the session history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.read().entries().to_vec()
    }

    /// Export history rows as a replayable script.
    ///
    /// Selection semantics follow [`History::export_selection`].
    pub fn export_history(&self, selected: &[usize]) -> Result<Script, ParseError> {
        self.history.read().export_selection(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{Actuator, Direction};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(9600, PlaybackConfig::default())
    }

    fn long_script() -> Script {
        Script::from_commands(std::iter::repeat(Command::Grab).take(500)).unwrap()
    }

    #[tokio::test]
    async fn test_everything_requires_a_connection() {
        let dispatcher = dispatcher();
        assert!(matches!(
            dispatcher.send_immediate(Command::Grab).await,
            Err(DispatchError::NotConnected)
        ));
        assert!(matches!(
            dispatcher.start_playback(long_script()),
            Err(DispatchError::NotConnected)
        ));
        assert!(matches!(
            dispatcher.cancel_playback(),
            Err(DispatchError::Engine(EngineError::NotPlaying))
        ));
        assert_eq!(dispatcher.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_immediate_sends_are_recorded_and_announced() {
        let dispatcher = dispatcher();
        let mut rx = dispatcher.subscribe();
        dispatcher.open_debug().await;

        dispatcher.grab().await.unwrap();
        dispatcher
            .send_immediate(Command::step(Actuator::Shoulder, 10, Direction::Positive).unwrap())
            .await
            .unwrap();
        dispatcher.reset().await.unwrap();

        let wires: Vec<String> = dispatcher.history().iter().map(HistoryEntry::wire).collect();
        assert_eq!(wires, vec!["gn", "s_10_1_n", "Zn"]);

        let mut sent = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ControllerEvent::CommandSent(command) = event {
                sent.push(command.encode());
            }
        }
        assert_eq!(sent, wires);
    }

    #[tokio::test]
    async fn test_history_exports_as_script() {
        let dispatcher = dispatcher();
        dispatcher.open_debug().await;
        dispatcher.grab().await.unwrap();
        dispatcher.reset().await.unwrap();

        let script = dispatcher.export_history(&[]).unwrap();
        assert_eq!(script.serialize(), "gNZn");
    }

    #[tokio::test]
    async fn test_playback_excludes_other_traffic() {
        let dispatcher = dispatcher();
        dispatcher.open_debug().await;

        // No await between these calls, so the worker has not run yet.
        let handle = dispatcher.start_playback(long_script()).unwrap();
        assert!(matches!(
            dispatcher.start_playback(long_script()),
            Err(DispatchError::Engine(EngineError::AlreadyPlaying))
        ));
        assert!(matches!(
            dispatcher.send_immediate(Command::Grab).await,
            Err(DispatchError::Engine(EngineError::AlreadyPlaying))
        ));

        dispatcher.cancel_playback().unwrap();
        let report = handle.wait().await;
        assert_eq!(report.lines_sent, 0);
        assert_eq!(dispatcher.playback_state(), PlaybackState::Cancelled);
        // The rejected immediate send left no trace.
        assert!(dispatcher.history().is_empty());
    }
}
