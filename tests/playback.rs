use samctl_core::{
    Actuator, Command, ControllerEvent, DispatchError, Dispatcher, Direction, EngineError,
    PlaybackConfig, PlaybackState, PlaybackStatus, Script,
};
use tokio::sync::broadcast::error::RecvError;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(9600, PlaybackConfig::default())
}

fn grabs(count: usize) -> Script {
    Script::from_commands(std::iter::repeat(Command::Grab).take(count)).unwrap()
}

#[tokio::test]
async fn playback_completes_over_debug_link() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;
    let mut rx = dispatcher.subscribe();

    let script = Script::parse("s_10_1_Nb_10_0_Ngn").unwrap();
    let handle = dispatcher.start_playback(script).unwrap();
    let report = handle.wait().await;

    assert_eq!(report.status, PlaybackStatus::Completed);
    assert_eq!(report.lines_sent, 3);
    assert_eq!(report.total_lines, 3);
    assert!(report.remaining.is_empty());
    assert_eq!(dispatcher.playback_state(), PlaybackState::Completed);

    let mut fractions = Vec::new();
    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            ControllerEvent::PlaybackProgress(fraction) => fractions.push(fraction),
            ControllerEvent::PlaybackFinished(status) => finished = Some(status),
            _ => {}
        }
    }
    assert_eq!(fractions.len(), 3);
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert_eq!(finished, Some(PlaybackStatus::Completed));
}

#[tokio::test]
async fn second_session_rejected_while_running() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;

    let handle = dispatcher.start_playback(grabs(500)).unwrap();
    assert!(matches!(
        dispatcher.start_playback(grabs(1)),
        Err(DispatchError::Engine(EngineError::AlreadyPlaying))
    ));

    dispatcher.cancel_playback().unwrap();
    let report = handle.wait().await;
    assert_eq!(report.status, PlaybackStatus::Cancelled);
    assert_eq!(report.lines_sent, 0);
}

#[tokio::test]
async fn immediate_sends_blocked_during_playback() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;

    let handle = dispatcher.start_playback(grabs(500)).unwrap();
    let blocked = dispatcher.send_immediate(Command::Reset).await;
    assert!(matches!(
        blocked,
        Err(DispatchError::Engine(EngineError::AlreadyPlaying))
    ));
    // The rejected command never reached the history.
    assert!(dispatcher.history().is_empty());

    dispatcher.cancel_playback().unwrap();
    handle.wait().await;
}

#[tokio::test]
async fn cancel_stops_partway() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;
    let mut rx = dispatcher.subscribe();

    let handle = dispatcher.start_playback(grabs(200)).unwrap();
    // Stop once the first line has gone out.
    while let Ok(event) = rx.recv().await {
        if matches!(event, ControllerEvent::PlaybackProgress(_)) {
            break;
        }
    }
    handle.cancel();
    let report = handle.wait().await;

    assert_eq!(report.status, PlaybackStatus::Cancelled);
    assert!(report.lines_sent < 200);
    // At most the one in-flight line is in neither count.
    assert!(200 - report.lines_sent - report.remaining.len() <= 1);
}

#[tokio::test]
async fn lagged_subscriber_still_sees_completion() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;
    let mut rx = dispatcher.subscribe();

    // More progress events than the channel holds, and nothing is read
    // until the session is over, so the receiver wakes up lagged.
    let handle = dispatcher.start_playback(grabs(1100)).unwrap();
    let report = handle.wait().await;
    assert_eq!(report.lines_sent, 1100);

    let mut lagged = false;
    let finished = loop {
        match rx.recv().await {
            Ok(ControllerEvent::PlaybackFinished(status)) => break Some(status),
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => lagged = true,
            Err(RecvError::Closed) => break None,
        }
    };
    assert!(lagged);
    assert_eq!(finished, Some(PlaybackStatus::Completed));
}

#[tokio::test]
async fn new_session_allowed_after_completion() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;

    let first = dispatcher.start_playback(Script::parse("gn").unwrap()).unwrap();
    assert_eq!(first.wait().await.status, PlaybackStatus::Completed);

    let second = dispatcher.start_playback(Script::parse("Zn").unwrap()).unwrap();
    assert_eq!(second.wait().await.status, PlaybackStatus::Completed);
}

#[tokio::test]
async fn immediate_sends_recorded_and_exported() {
    let dispatcher = dispatcher();
    dispatcher.open_debug().await;

    dispatcher.grab().await.unwrap();
    dispatcher
        .send_immediate(Command::step(Actuator::Shoulder, 10, Direction::Positive).unwrap())
        .await
        .unwrap();

    let script = dispatcher.export_history(&[]).unwrap();
    assert_eq!(script.serialize(), "gNs_10_1_n");
}
