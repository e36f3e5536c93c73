//! Scripted playback over the active link.
//!
//! A session drains its script on a dedicated background task under the
//! controller's flow control: before every line the worker waits for the
//! ready byte, with cancellation checked after each poll and again before
//! each write. The unbounded busy-wait of the original protocol is bounded
//! by a configurable overall deadline per line.

use crate::core::connection::ActiveLink;
use crate::core::event::{ControllerEvent, ErrorCategory};
use crate::core::script::{Script, ScriptLine};
use crate::core::transport::{TransportError, READY_BYTE};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};
use uuid::Uuid;

/// Playback engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A session is already running on the transport
    #[error("a playback session is already running")]
    AlreadyPlaying,

    /// No session is running
    #[error("no playback session is running")]
    NotPlaying,
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No session exists
    Idle,
    /// The worker is draining the script
    Running,
    /// Every line was sent
    Completed,
    /// Cancelled on request
    Cancelled,
    /// Terminated by an I/O fault or a silent link
    Failed,
}

impl PlaybackState {
    /// True while the worker may still write
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// True once the session can never write again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Every line was sent
    Completed,
    /// Stopped at a safe checkpoint on request
    Cancelled,
    /// Stopped by a fault; the message describes it
    Failed {
        /// What went wrong
        message: String,
    },
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// Final accounting of a session. `remaining` holds the untouched tail;
/// a line consumed by a failed step is in neither count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Terminal outcome
    pub status: PlaybackStatus,
    /// Lines fully written to the link
    pub lines_sent: usize,
    /// Lines the script started with
    pub total_lines: usize,
    /// Lines never attempted, in order
    pub remaining: Vec<ScriptLine>,
}

/// Flow-control tuning
#[derive(Debug, Clone, Copy)]
pub struct PlaybackConfig {
    /// Longest wait for the ready byte before a line is given up on
    pub ready_timeout: Duration,
    /// Pause between unsuccessful ready polls
    pub poll_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// State shared between an engine, a handle and its worker.
struct SessionShared {
    id: Uuid,
    state: RwLock<PlaybackState>,
    progress: RwLock<f32>,
    cancel: AtomicBool,
    lines_sent: AtomicUsize,
    total_lines: usize,
    report: RwLock<Option<PlaybackReport>>,
}

/// Caller's handle to one running session.
///
/// Owns the cancellation token; dropping the handle neither cancels nor
/// detaches the worker, it only gives up the ability to `wait`.
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    task: JoinHandle<PlaybackReport>,
}

impl SessionHandle {
    /// Unique id of this session
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Current session state
    pub fn state(&self) -> PlaybackState {
        *self.shared.state.read()
    }

    /// Fraction of lines sent so far, in `[0, 1]`
    pub fn progress(&self) -> f32 {
        *self.shared.progress.read()
    }

    /// Request cancellation at the next safe checkpoint.
    ///
    /// Idempotent; harmless after natural completion.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    /// True once the worker has returned
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to reach a terminal state.
    pub async fn wait(self) -> PlaybackReport {
        let shared = self.shared;
        match self.task.await {
            Ok(report) => report,
            // The worker panicked or was aborted; report what it left behind.
            Err(_) => shared.report.read().clone().unwrap_or_else(|| PlaybackReport {
                status: PlaybackStatus::Failed {
                    message: "playback worker terminated abnormally".to_string(),
                },
                lines_sent: shared.lines_sent.load(Ordering::SeqCst),
                total_lines: shared.total_lines,
                remaining: Vec::new(),
            }),
        }
    }
}

/// Drives at most one session per transport.
pub struct PlaybackEngine {
    config: PlaybackConfig,
    events: broadcast::Sender<ControllerEvent>,
    current: Mutex<Option<Arc<SessionShared>>>,
}

impl PlaybackEngine {
    /// Engine with no session.
    pub fn new(config: PlaybackConfig, events: broadcast::Sender<ControllerEvent>) -> Self {
        Self {
            config,
            events,
            current: Mutex::new(None),
        }
    }

    /// Start playing a script on the given link.
    ///
    /// Rejected with [`EngineError::AlreadyPlaying`] while a session is
    /// running; a terminal previous session is displaced.
    pub fn start(&self, script: Script, link: Arc<ActiveLink>) -> Result<SessionHandle, EngineError> {
        let mut current = self.current.lock();
        if let Some(shared) = current.as_ref() {
            if shared.state.read().is_running() {
                return Err(EngineError::AlreadyPlaying);
            }
        }

        let lines = script.into_lines();
        let shared = Arc::new(SessionShared {
            id: Uuid::new_v4(),
            state: RwLock::new(PlaybackState::Running),
            progress: RwLock::new(0.0),
            cancel: AtomicBool::new(false),
            lines_sent: AtomicUsize::new(0),
            total_lines: lines.len(),
            report: RwLock::new(None),
        });
        *current = Some(shared.clone());
        // Held until the worker reaches a terminal state; immediate writes
        // are refused at the link while it stands.
        link.claim();

        info!(session = %shared.id, lines = shared.total_lines, "playback started");
        let task = tokio::spawn(run_session(
            shared.clone(),
            link,
            lines,
            self.events.clone(),
            self.config,
        ));

        Ok(SessionHandle { shared, task })
    }

    /// Cancel the running session.
    ///
    /// Unlike [`SessionHandle::cancel`] this fails with
    /// [`EngineError::NotPlaying`] when nothing is running.
    pub fn cancel(&self) -> Result<(), EngineError> {
        let current = self.current.lock();
        match current.as_ref() {
            Some(shared) if shared.state.read().is_running() => {
                shared.cancel.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(EngineError::NotPlaying),
        }
    }

    /// State of the engine's session, [`PlaybackState::Idle`] when none.
    pub fn state(&self) -> PlaybackState {
        self.current
            .lock()
            .as_ref()
            .map(|shared| *shared.state.read())
            .unwrap_or(PlaybackState::Idle)
    }

    /// True while a session is running
    pub fn is_playing(&self) -> bool {
        self.state().is_running()
    }
}

enum WaitOutcome {
    Ready,
    Cancelled,
    TimedOut,
    Faulted(TransportError),
}

async fn wait_for_ready(
    link: &ActiveLink,
    shared: &SessionShared,
    config: &PlaybackConfig,
) -> WaitOutcome {
    let deadline = Instant::now() + config.ready_timeout;
    loop {
        if shared.cancel.load(Ordering::SeqCst) {
            return WaitOutcome::Cancelled;
        }
        if Instant::now() >= deadline {
            return WaitOutcome::TimedOut;
        }
        match link.poll_ready().await {
            Ok(Some(READY_BYTE)) => return WaitOutcome::Ready,
            Ok(Some(_)) | Ok(None) => tokio::time::sleep(config.poll_interval).await,
            Err(err) => return WaitOutcome::Faulted(err),
        }
    }
}

async fn run_session(
    shared: Arc<SessionShared>,
    link: Arc<ActiveLink>,
    lines: Vec<ScriptLine>,
    events: broadcast::Sender<ControllerEvent>,
    config: PlaybackConfig,
) -> PlaybackReport {
    let total = shared.total_lines;
    let mut remaining: VecDeque<ScriptLine> = lines.into();
    let mut sent = 0usize;

    let status = loop {
        if shared.cancel.load(Ordering::SeqCst) {
            break PlaybackStatus::Cancelled;
        }
        let Some(line) = remaining.pop_front() else {
            break PlaybackStatus::Completed;
        };

        match wait_for_ready(&link, &shared, &config).await {
            WaitOutcome::Ready => {}
            WaitOutcome::Cancelled => break PlaybackStatus::Cancelled,
            WaitOutcome::TimedOut => {
                break PlaybackStatus::Failed {
                    message: format!(
                        "ready byte not seen within {:?} before {:?}",
                        config.ready_timeout, line.text
                    ),
                }
            }
            WaitOutcome::Faulted(err) => {
                break PlaybackStatus::Failed {
                    message: err.to_string(),
                }
            }
        }

        // Last checkpoint before the frame goes out.
        if shared.cancel.load(Ordering::SeqCst) {
            break PlaybackStatus::Cancelled;
        }

        if let Err(err) = link.write_command(line.text.as_bytes()).await {
            break PlaybackStatus::Failed {
                message: err.to_string(),
            };
        }

        sent += 1;
        shared.lines_sent.store(sent, Ordering::SeqCst);
        let fraction = sent as f32 / total as f32;
        *shared.progress.write() = fraction;
        let _ = events.send(ControllerEvent::PlaybackProgress(fraction));
        trace!(session = %shared.id, line = %line.text, sent, total, "line sent");
    };

    // The session writes nothing after this point.
    link.release();

    let state = match &status {
        PlaybackStatus::Completed => PlaybackState::Completed,
        PlaybackStatus::Cancelled => PlaybackState::Cancelled,
        PlaybackStatus::Failed { .. } => PlaybackState::Failed,
    };
    *shared.state.write() = state;

    let report = PlaybackReport {
        status: status.clone(),
        lines_sent: sent,
        total_lines: total,
        remaining: remaining.into(),
    };
    *shared.report.write() = Some(report.clone());

    match &report.status {
        PlaybackStatus::Completed => {
            info!(session = %shared.id, sent, "playback completed");
        }
        PlaybackStatus::Cancelled => {
            info!(session = %shared.id, sent, total, "playback cancelled");
        }
        PlaybackStatus::Failed { message } => {
            warn!(session = %shared.id, sent, total, error = %message, "playback failed");
            let _ = events.send(ControllerEvent::Error {
                kind: ErrorCategory::Playback,
                message: message.clone(),
            });
        }
    }
    let _ = events.send(ControllerEvent::PlaybackFinished(report.status.clone()));

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::{Actuator, Command, Direction};
    use crate::core::event::event_channel;
    use crate::core::transport::{TransportKind, TransportTrait};
    use async_trait::async_trait;

    struct ScriptedLink {
        busy_polls_per_line: u32,
        busy_countdown: u32,
        never_ready: bool,
        fail_poll_at_write: Option<usize>,
        writes: Arc<Mutex<Vec<String>>>,
        polls: Arc<Mutex<usize>>,
    }

    impl ScriptedLink {
        fn always_ready() -> Self {
            Self::with_busy_polls(0)
        }

        fn with_busy_polls(busy_polls_per_line: u32) -> Self {
            Self {
                busy_polls_per_line,
                busy_countdown: busy_polls_per_line,
                never_ready: false,
                fail_poll_at_write: None,
                writes: Arc::new(Mutex::new(Vec::new())),
                polls: Arc::new(Mutex::new(0)),
            }
        }

        fn never_ready() -> Self {
            let mut link = Self::always_ready();
            link.never_ready = true;
            link
        }

        fn failing_before_write(index: usize) -> Self {
            let mut link = Self::always_ready();
            link.fail_poll_at_write = Some(index);
            link
        }
    }

    #[async_trait]
    impl TransportTrait for ScriptedLink {
        async fn connect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn poll_ready(&mut self) -> Result<Option<u8>, TransportError> {
            *self.polls.lock() += 1;
            if self.fail_poll_at_write == Some(self.writes.lock().len()) {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "link dropped",
                )));
            }
            if self.never_ready {
                return Ok(Some(b'1'));
            }
            if self.busy_countdown > 0 {
                self.busy_countdown -= 1;
                return Ok(Some(b'1'));
            }
            self.busy_countdown = self.busy_polls_per_line;
            Ok(Some(READY_BYTE))
        }

        async fn write_command(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            self.writes.lock().push(String::from_utf8_lossy(frame).into_owned());
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Debug
        }

        fn connection_info(&self) -> String {
            "scripted".to_string()
        }
    }

    fn fast_config() -> PlaybackConfig {
        PlaybackConfig {
            ready_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn steps(count: u32) -> Script {
        Script::from_commands(
            (1..=count)
                .map(|i| Command::step(Actuator::Shoulder, i, Direction::Positive).unwrap()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_run_sends_every_line() {
        let events = event_channel();
        let mut rx = events.subscribe();
        let engine = PlaybackEngine::new(fast_config(), events.clone());

        let transport = ScriptedLink::with_busy_polls(1);
        let writes = transport.writes.clone();
        let polls = transport.polls.clone();
        let link = ActiveLink::new(Box::new(transport), events);

        let script = Script::parse("s_10_1_Nb_10_0_Ngn").unwrap();
        let handle = engine.start(script, link).unwrap();
        let report = handle.wait().await;

        assert_eq!(report.status, PlaybackStatus::Completed);
        assert_eq!(report.lines_sent, 3);
        assert_eq!(report.total_lines, 3);
        assert!(report.remaining.is_empty());
        assert_eq!(*writes.lock(), vec!["s_10_1_n", "b_10_0_n", "gn"]);
        // Every write was preceded by at least one poll.
        assert!(*polls.lock() >= 3);
        assert_eq!(engine.state(), PlaybackState::Completed);

        let mut fractions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ControllerEvent::PlaybackProgress(fraction) = event {
                fractions.push(fraction);
            }
        }
        assert_eq!(fractions.len(), 3);
        assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_any_write() {
        let events = event_channel();
        let engine = PlaybackEngine::new(fast_config(), events.clone());
        let transport = ScriptedLink::never_ready();
        let writes = transport.writes.clone();
        let link = ActiveLink::new(Box::new(transport), events);

        let handle = engine.start(steps(4), link.clone()).unwrap();
        handle.cancel();
        handle.cancel(); // idempotent
        let report = handle.wait().await;

        assert_eq!(report.status, PlaybackStatus::Cancelled);
        assert_eq!(report.lines_sent, 0);
        assert!(writes.lock().is_empty());
        assert!(!link.is_claimed());
        assert_eq!(engine.state(), PlaybackState::Cancelled);
        // Nothing is running anymore.
        assert_eq!(engine.cancel(), Err(EngineError::NotPlaying));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let events = event_channel();
        let engine = PlaybackEngine::new(fast_config(), events.clone());
        let link = ActiveLink::new(Box::new(ScriptedLink::never_ready()), events.clone());

        let handle = engine.start(steps(2), link.clone()).unwrap();
        let second = engine.start(steps(2), link);
        assert!(matches!(second, Err(EngineError::AlreadyPlaying)));

        engine.cancel().unwrap();
        let report = handle.wait().await;
        assert_eq!(report.status, PlaybackStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_running_session_claims_the_link() {
        let events = event_channel();
        let engine = PlaybackEngine::new(fast_config(), events.clone());
        let transport = ScriptedLink::always_ready();
        let writes = transport.writes.clone();
        let link = ActiveLink::new(Box::new(transport), events);

        let handle = engine.start(steps(3), link.clone()).unwrap();
        // An immediate write whose pre-flight check raced the start is
        // refused at the link, not woven into the stream.
        assert!(link.is_claimed());
        assert!(!link.write_if_unclaimed(b"gn").await.unwrap());

        let report = handle.wait().await;
        assert_eq!(report.status, PlaybackStatus::Completed);
        assert_eq!(*writes.lock(), vec!["s_1_1_n", "s_2_1_n", "s_3_1_n"]);

        // Terminal sessions hand the link back.
        assert!(!link.is_claimed());
        assert!(link.write_if_unclaimed(b"gn").await.unwrap());
        assert_eq!(writes.lock().last().map(String::as_str), Some("gn"));
    }

    #[tokio::test]
    async fn test_read_fault_reports_progress_and_tail() {
        let events = event_channel();
        let engine = PlaybackEngine::new(fast_config(), events.clone());
        // The poll before the third write fails.
        let transport = ScriptedLink::failing_before_write(2);
        let link = ActiveLink::new(Box::new(transport), events);

        let handle = engine.start(steps(5), link.clone()).unwrap();
        let report = handle.wait().await;

        assert!(matches!(report.status, PlaybackStatus::Failed { .. }));
        assert_eq!(report.lines_sent, 2);
        assert_eq!(report.total_lines, 5);
        let tail: Vec<&str> = report.remaining.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(tail, vec!["s_4_1_n", "s_5_1_n"]);
        // The faulted link is out of service.
        assert!(!link.is_healthy());
        assert_eq!(engine.state(), PlaybackState::Failed);
    }

    #[tokio::test]
    async fn test_silent_link_times_out_without_invalidating() {
        let events = event_channel();
        let config = PlaybackConfig {
            ready_timeout: Duration::from_millis(40),
            poll_interval: Duration::from_millis(2),
        };
        let engine = PlaybackEngine::new(config, events.clone());
        let link = ActiveLink::new(Box::new(ScriptedLink::never_ready()), events);

        let handle = engine.start(steps(2), link.clone()).unwrap();
        let report = handle.wait().await;

        match report.status {
            PlaybackStatus::Failed { ref message } => assert!(message.contains("ready byte")),
            ref other => panic!("unexpected status: {:?}", other),
        }
        assert_eq!(report.lines_sent, 0);
        // A silent controller is not an I/O fault.
        assert!(link.is_healthy());
        assert!(!link.is_claimed());
    }

    #[tokio::test]
    async fn test_engine_reports_idle_without_session() {
        let events = event_channel();
        let engine = PlaybackEngine::new(PlaybackConfig::default(), events);
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!engine.is_playing());
        assert_eq!(engine.cancel(), Err(EngineError::NotPlaying));
    }
}
