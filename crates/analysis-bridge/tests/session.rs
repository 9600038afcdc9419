//! Engine session lifecycle against the `mock-uci` engine.

use analysis_bridge::{
    AnalysisBackend, AnalysisResult, EngineConfig, EngineError, EnginePosition, EngineSession,
    Evaluation, RequestId, SearchLimit, SessionEvent, SessionState,
};
use chess_rules::{GameTimeline, Position};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn mock_config(args: &[&str]) -> EngineConfig {
    EngineConfig {
        args: args.iter().map(|a| a.to_string()).collect(),
        handshake_timeout_ms: 2000,
        ..EngineConfig::with_path(env!("CARGO_BIN_EXE_mock-uci"))
    }
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("engine event in time")
        .expect("event channel open")
}

/// Waits for `request` to finish, failing if another request finishes first.
async fn finished(
    events: &mut UnboundedReceiver<SessionEvent>,
    request: RequestId,
) -> AnalysisResult {
    loop {
        match next_event(events).await {
            SessionEvent::Finished { request: r, result } if r == request => return result,
            SessionEvent::Finished { request: r, .. } => panic!("unexpected reply to {}", r),
            SessionEvent::Progress { .. } => {}
            SessionEvent::Stopped { crashed, .. } => {
                panic!("engine stopped (crashed: {})", crashed)
            }
        }
    }
}

fn startpos() -> EnginePosition {
    EnginePosition::from_position(Position::startpos())
}

#[tokio::test]
async fn handshake_reaches_ready() {
    let (session, _events) = EngineSession::new(mock_config(&["--name", "Scripted"]));
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.engine_name().as_deref(), Some("Scripted"));

    // Starting again while ready does nothing.
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn silent_engine_fails_handshake() {
    let mut config = mock_config(&["--silent"]);
    config.handshake_timeout_ms = 200;
    let (session, _events) = EngineSession::new(config);

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, EngineError::Handshake(_)), "got {:?}", err);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let (session, _events) =
        EngineSession::new(EngineConfig::with_path("/nonexistent/path/to/engine"));
    let err = session.start().await.unwrap_err();
    assert!(matches!(err, EngineError::Spawn(_)), "got {:?}", err);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn analysis_runs_to_a_final_result() {
    let (session, mut events) = EngineSession::new(mock_config(&[]));
    session.start().await.unwrap();

    assert!(matches!(
        session.request_analysis(&SearchLimit::depth(3)),
        Err(EngineError::NoPosition)
    ));

    session.set_position(&startpos()).unwrap();
    let request = session.request_analysis(&SearchLimit::depth(3)).unwrap();
    assert_eq!(session.state(), SessionState::Analyzing);
    assert_eq!(session.active_request(), Some(request));

    let result = finished(&mut events, request).await;
    assert!(result.is_final);
    assert_eq!(result.fingerprint, Position::startpos().fingerprint());
    assert_eq!(result.depth, 3);
    // Every opening move scores equal; the mock breaks ties alphabetically.
    assert_eq!(result.best_move.as_deref(), Some("a2a3"));
    assert_eq!(result.evaluation, Some(Evaluation::Centipawns(0)));
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.active_request(), None);

    session.stop().await;
}

#[tokio::test]
async fn scores_are_reported_from_whites_view() {
    let (session, mut events) = EngineSession::new(mock_config(&[]));
    session.start().await.unwrap();

    // Black to move; dxe4 is the only capture.
    let mut game = GameTimeline::new();
    for m in ["e4", "d5", "Nc3"] {
        game.make_move(m).unwrap();
    }

    session.set_position(&EnginePosition::from(&game)).unwrap();
    let request = session.request_analysis(&SearchLimit::depth(2)).unwrap();
    let result = finished(&mut events, request).await;

    assert_eq!(result.best_move.as_deref(), Some("d5e4"));
    assert_eq!(result.evaluation, Some(Evaluation::Centipawns(-100)));
    session.stop().await;
}

#[tokio::test]
async fn multipv_lines_are_ranked() {
    let (session, mut events) = EngineSession::new(mock_config(&[]));
    session.start().await.unwrap();
    session.set_position(&startpos()).unwrap();

    let request = session
        .request_analysis(&SearchLimit::depth(2).with_lines(3))
        .unwrap();
    let result = finished(&mut events, request).await;

    let ranks: Vec<u32> = result.lines.iter().map(|l| l.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(result.lines[0].moves, vec!["a2a3"]);
    session.stop().await;
}

#[tokio::test]
async fn new_request_supersedes_the_previous_one() {
    let (session, mut events) = EngineSession::new(mock_config(&["--think-ms", "50"]));
    session.start().await.unwrap();
    session.set_position(&startpos()).unwrap();

    let slow = session.request_analysis(&SearchLimit::depth(60)).unwrap();
    let quick = session.request_analysis(&SearchLimit::depth(1)).unwrap();
    assert!(quick > slow);

    // `finished` panics if the superseded request's reply leaks through.
    let result = finished(&mut events, quick).await;
    assert_eq!(result.request, quick);
    session.stop().await;
}

#[tokio::test]
async fn cancel_drops_the_reply() {
    let (session, mut events) = EngineSession::new(mock_config(&["--think-ms", "50"]));
    session.start().await.unwrap();
    session.set_position(&startpos()).unwrap();

    let request = session.request_analysis(&SearchLimit::depth(60)).unwrap();
    session.cancel(request);
    assert_eq!(session.state(), SessionState::Ready);

    // The next request still gets its own answer.
    let next = session.request_analysis(&SearchLimit::depth(1)).unwrap();
    let result = finished(&mut events, next).await;
    assert_eq!(result.request, next);
    session.stop().await;
}

#[tokio::test]
async fn crash_while_analyzing_stops_the_session() {
    let (session, mut events) = EngineSession::new(mock_config(&["--crash-on-go"]));
    session.start().await.unwrap();
    session.set_position(&startpos()).unwrap();
    let request = session.request_analysis(&SearchLimit::depth(5)).unwrap();

    match next_event(&mut events).await {
        SessionEvent::Stopped { active, crashed } => {
            assert!(crashed);
            assert_eq!(active, Some(request));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(matches!(
        session.set_position(&startpos()),
        Err(EngineError::NotRunning(SessionState::Stopped))
    ));

    // The dead process is reaped and a new one started.
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    session.stop().await;
}

#[tokio::test]
async fn stop_is_safe_in_any_state() {
    let (session, mut events) = EngineSession::new(mock_config(&[]));
    session.stop().await;

    session.start().await.unwrap();
    session.set_position(&startpos()).unwrap();
    session.request_analysis(&SearchLimit::depth(60)).unwrap();
    session.stop().await;
    session.stop().await;
    assert_eq!(session.state(), SessionState::Stopped);

    loop {
        if let SessionEvent::Stopped { crashed, .. } = next_event(&mut events).await {
            assert!(!crashed);
            break;
        }
    }
}
