//! Ties the game to the engine: one live request per position, results
//! published only while they still describe the current position.

use crate::analysis::{AnalysisResult, DetailedEvaluation, RequestId, SearchLimit};
use crate::config::AnalysisSettings;
use crate::error::EngineError;
use crate::session::{AnalysisBackend, EnginePosition, EngineSession, SessionEvent, SessionState};
use chess_rules::{Fingerprint, Position};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Recorded request correlations kept at most.
const MAX_TRACKED_REQUESTS: usize = 64;

/// Capacity of the subscriber channel; slow subscribers lose old updates.
const UPDATE_CAPACITY: usize = 64;

/// What subscribers receive.
#[derive(Debug, Clone)]
pub enum AnalysisUpdate {
    /// Analysis of the position currently on the board.
    Result(AnalysisResult),
    /// The engine went away. Game play is unaffected.
    EngineStopped { crashed: bool },
}

type Waiter = oneshot::Sender<Result<AnalysisResult, EngineError>>;

struct CoordinatorState {
    enabled: bool,
    current: Option<EnginePosition>,
    active: Option<RequestId>,
    requests: BTreeMap<RequestId, Fingerprint>,
    waiters: HashMap<RequestId, Waiter>,
    latest: Option<AnalysisResult>,
}

impl CoordinatorState {
    fn record(&mut self, request: RequestId, fingerprint: Fingerprint) {
        self.requests.insert(request, fingerprint);
        while self.requests.len() > MAX_TRACKED_REQUESTS {
            self.requests.pop_first();
        }
    }

    /// Drops a request's correlation and fails anyone waiting on it.
    fn forget(&mut self, request: RequestId) {
        self.requests.remove(&request);
        if self.active == Some(request) {
            self.active = None;
        }
        if let Some(waiter) = self.waiters.remove(&request) {
            let _ = waiter.send(Err(EngineError::Cancelled));
        }
    }
}

struct Inner {
    state: Mutex<CoordinatorState>,
    updates: broadcast::Sender<AnalysisUpdate>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, request: RequestId, result: AnalysisResult) -> bool {
        let mut state = self.lock();

        if result.is_final {
            if let Some(waiter) = state.waiters.remove(&request) {
                let _ = waiter.send(Ok(result.clone()));
            }
        }

        let expected = state.requests.get(&request).copied();
        let current = state.current.as_ref().map(EnginePosition::fingerprint);
        let fresh = match (expected, current) {
            (Some(expected), Some(current)) => {
                expected == current && result.fingerprint == expected
            }
            _ => false,
        };

        if result.is_final {
            state.requests.remove(&request);
            if state.active == Some(request) {
                state.active = None;
            }
        }

        if !fresh {
            tracing::debug!("Discarding stale analysis {}", request);
            return false;
        }

        if result.is_final {
            state.latest = Some(result.clone());
        }
        let _ = self.updates.send(AnalysisUpdate::Result(result));
        true
    }

    fn engine_stopped(&self, active: Option<RequestId>, crashed: bool) {
        let mut state = self.lock();
        if let Some(request) = active {
            state.requests.remove(&request);
        }
        state.active = None;
        for (_, waiter) in state.waiters.drain() {
            let error = if crashed {
                EngineError::Crashed
            } else {
                EngineError::NotRunning(SessionState::Stopped)
            };
            let _ = waiter.send(Err(error));
        }
        if crashed {
            tracing::warn!("Engine crashed; analysis paused until it is restarted");
        }
        let _ = self.updates.send(AnalysisUpdate::EngineStopped { crashed });
    }
}

/// Issues analysis for the game's current position and republishes results.
///
/// The coordinator is the only thing that talks to the backend about
/// requests. Results are routed back by a dispatcher task that drains the
/// session's event channel.
pub struct AnalysisCoordinator<B: AnalysisBackend = EngineSession> {
    backend: B,
    settings: AnalysisSettings,
    inner: Arc<Inner>,
    dispatcher: JoinHandle<()>,
}

impl<B: AnalysisBackend> AnalysisCoordinator<B> {
    /// Must be called inside a Tokio runtime; spawns the dispatcher.
    pub fn new(
        backend: B,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        settings: AnalysisSettings,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let inner = Arc::new(Inner {
            state: Mutex::new(CoordinatorState {
                enabled: settings.enabled,
                current: None,
                active: None,
                requests: BTreeMap::new(),
                waiters: HashMap::new(),
                latest: None,
            }),
            updates,
        });

        let dispatch = Arc::clone(&inner);
        let dispatcher = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Progress { request, result }
                    | SessionEvent::Finished { request, result } => {
                        dispatch.deliver(request, result);
                    }
                    SessionEvent::Stopped { active, crashed } => {
                        dispatch.engine_stopped(active, crashed);
                    }
                }
            }
        });

        Self {
            backend,
            settings,
            inner,
            dispatcher,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// The request being searched for the board, if any.
    pub fn active_request(&self) -> Option<RequestId> {
        self.inner.lock().active
    }

    /// The last final result published for the current position.
    pub fn latest(&self) -> Option<AnalysisResult> {
        self.inner.lock().latest.clone()
    }

    /// Called after every move, undo, redo or load.
    ///
    /// Returns the new request, or `None` when analysis is disabled.
    pub fn on_position_changed(
        &self,
        position: EnginePosition,
    ) -> Result<Option<RequestId>, EngineError> {
        let mut state = self.inner.lock();
        state.latest = None;
        state.current = Some(position.clone());
        if !state.enabled {
            return Ok(None);
        }
        let limit = self.settings.live_limit();
        self.issue(&mut state, &position, &limit).map(Some)
    }

    /// Publishes `result` unless it belongs to an outdated position.
    /// Returns whether it was published.
    pub fn on_engine_result(&self, request: RequestId, result: AnalysisResult) -> bool {
        self.inner.deliver(request, result)
    }

    /// Turning analysis off cancels the request in flight but leaves the
    /// engine running; turning it on analyses the current position.
    pub fn set_enabled(&self, enabled: bool) -> Result<Option<RequestId>, EngineError> {
        let mut state = self.inner.lock();
        if state.enabled == enabled {
            return Ok(None);
        }
        state.enabled = enabled;
        tracing::info!("Analysis {}", if enabled { "enabled" } else { "disabled" });

        if !enabled {
            if let Some(active) = state.active {
                self.backend.cancel(active);
                state.forget(active);
                tracing::debug!("Cancelled analysis {}", active);
            }
            return Ok(None);
        }

        match state.current.clone() {
            Some(position) => {
                let limit = self.settings.live_limit();
                self.issue(&mut state, &position, &limit).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Runs one full search on `position` and waits for its answer.
    ///
    /// Live analysis of the current position resumes afterwards, whether or
    /// not the evaluation succeeded.
    pub async fn evaluate_detailed(
        &self,
        position: &Position,
    ) -> Result<DetailedEvaluation, EngineError> {
        let target = match self.inner.lock().current.clone() {
            Some(current) if current.position == *position => current,
            _ => EnginePosition::from_position(*position),
        };

        let (request, answer) = {
            let mut state = self.inner.lock();
            let limit = self.settings.detailed_limit();
            let request = self.issue(&mut state, &target, &limit)?;
            let (tx, rx) = oneshot::channel();
            state.waiters.insert(request, tx);
            (request, rx)
        };

        let timeout = self.settings.eval_timeout();
        let outcome = match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Cancelled),
            Err(_) => {
                tracing::warn!("Detailed evaluation timed out after {:?}", timeout);
                self.backend.cancel(request);
                self.inner.lock().forget(request);
                Err(EngineError::Timeout(timeout))
            }
        };

        self.resume_live();
        let result = outcome?;
        Ok(DetailedEvaluation::new(position, &result))
    }

    fn resume_live(&self) {
        let mut state = self.inner.lock();
        if !state.enabled || state.active.is_some() {
            return;
        }
        let Some(position) = state.current.clone() else {
            return;
        };
        let limit = self.settings.live_limit();
        if let Err(e) = self.issue(&mut state, &position, &limit) {
            tracing::warn!("Could not resume live analysis: {}", e);
        }
    }

    /// Supersedes the active request and starts a new one. The state lock is
    /// held throughout, so a result cannot arrive before it is recorded.
    fn issue(
        &self,
        state: &mut CoordinatorState,
        position: &EnginePosition,
        limit: &SearchLimit,
    ) -> Result<RequestId, EngineError> {
        if let Some(previous) = state.active {
            self.backend.cancel(previous);
            state.forget(previous);
            tracing::debug!("Cancelled analysis {}", previous);
        }

        self.backend.set_position(position)?;
        let request = self.backend.request_analysis(limit)?;
        state.record(request, position.fingerprint());
        state.active = Some(request);
        tracing::debug!("Issued analysis {} for {}", request, position.fingerprint());
        Ok(request)
    }
}

impl<B: AnalysisBackend> Drop for AnalysisCoordinator<B> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Evaluation;
    use chess_rules::GameTimeline;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Records calls instead of talking to a process.
    #[derive(Default)]
    struct ScriptedBackend {
        next: AtomicU64,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AnalysisBackend for ScriptedBackend {
        fn state(&self) -> SessionState {
            SessionState::Ready
        }

        fn set_position(&self, position: &EnginePosition) -> Result<(), EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("position {}", position.moves.join(" ")));
            Ok(())
        }

        fn request_analysis(&self, limit: &SearchLimit) -> Result<RequestId, EngineError> {
            let id = RequestId(self.next.fetch_add(1, Ordering::SeqCst) + 1);
            self.calls
                .lock()
                .unwrap()
                .push(format!("go {} lines {}", id, limit.lines));
            Ok(id)
        }

        fn cancel(&self, request: RequestId) {
            self.calls.lock().unwrap().push(format!("cancel {}", request));
        }
    }

    fn coordinator() -> (
        AnalysisCoordinator<ScriptedBackend>,
        mpsc::UnboundedSender<SessionEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator =
            AnalysisCoordinator::new(ScriptedBackend::default(), rx, AnalysisSettings::default());
        (coordinator, tx)
    }

    fn result_for(request: RequestId, position: &EnginePosition) -> AnalysisResult {
        AnalysisResult {
            request,
            fingerprint: position.fingerprint(),
            best_move: Some("e7e5".to_string()),
            evaluation: Some(Evaluation::Centipawns(20)),
            depth: 10,
            nodes: None,
            lines: Vec::new(),
            timestamp: Utc::now(),
            is_final: true,
        }
    }

    fn after(moves: &[&str]) -> EnginePosition {
        let mut game = GameTimeline::new();
        for m in moves {
            game.make_move(m).unwrap();
        }
        EnginePosition::from(&game)
    }

    #[tokio::test]
    async fn stale_results_are_not_published() {
        let (coordinator, _events) = coordinator();
        let mut updates = coordinator.subscribe();

        let p1 = after(&["e4"]);
        let p2 = after(&["e4", "e5"]);
        let r1 = coordinator.on_position_changed(p1.clone()).unwrap().unwrap();
        let r2 = coordinator.on_position_changed(p2.clone()).unwrap().unwrap();
        assert_ne!(r1, r2);
        assert_eq!(
            coordinator.backend().calls(),
            vec![
                "position e2e4".to_string(),
                format!("go {} lines 1", r1),
                format!("cancel {}", r1),
                "position e2e4 e7e5".to_string(),
                format!("go {} lines 1", r2),
            ]
        );

        assert!(!coordinator.on_engine_result(r1, result_for(r1, &p1)));
        assert!(updates.try_recv().is_err());

        assert!(coordinator.on_engine_result(r2, result_for(r2, &p2)));
        match updates.try_recv().unwrap() {
            AnalysisUpdate::Result(result) => assert_eq!(result.request, r2),
            other => panic!("unexpected update {:?}", other),
        }
        assert_eq!(coordinator.latest().map(|r| r.request), Some(r2));
        assert_eq!(coordinator.active_request(), None);
    }

    #[tokio::test]
    async fn result_for_a_position_left_behind_is_stale() {
        let (coordinator, _events) = coordinator();
        let p1 = after(&["d4"]);
        let r1 = coordinator.on_position_changed(p1.clone()).unwrap().unwrap();

        // Position changes while analysis is disabled: no new request, but the
        // old result no longer matches the board.
        coordinator.set_enabled(false).unwrap();
        coordinator.on_position_changed(after(&["d4", "d5"])).unwrap();
        assert!(!coordinator.on_engine_result(r1, result_for(r1, &p1)));
    }

    #[tokio::test]
    async fn toggling_cancels_and_resumes() {
        let (coordinator, _events) = coordinator();
        let position = after(&["c4"]);
        let first = coordinator.on_position_changed(position.clone()).unwrap().unwrap();

        assert_eq!(coordinator.set_enabled(false).unwrap(), None);
        assert!(!coordinator.is_enabled());
        assert!(coordinator.backend().calls().contains(&format!("cancel {}", first)));
        assert_eq!(coordinator.on_position_changed(position.clone()).unwrap(), None);

        let resumed = coordinator.set_enabled(true).unwrap().unwrap();
        assert_ne!(resumed, first);
        assert_eq!(coordinator.active_request(), Some(resumed));
        assert!(coordinator.on_engine_result(resumed, result_for(resumed, &position)));
    }

    #[tokio::test]
    async fn session_events_flow_through_the_dispatcher() {
        let (coordinator, events) = coordinator();
        let mut updates = coordinator.subscribe();
        let position = after(&["e4", "c5"]);
        let request = coordinator.on_position_changed(position.clone()).unwrap().unwrap();

        events
            .send(SessionEvent::Finished {
                request,
                result: result_for(request, &position),
            })
            .unwrap();
        match updates.recv().await.unwrap() {
            AnalysisUpdate::Result(result) => {
                assert_eq!(result.best_move.as_deref(), Some("e7e5"))
            }
            other => panic!("unexpected update {:?}", other),
        }

        events
            .send(SessionEvent::Stopped {
                active: None,
                crashed: true,
            })
            .unwrap();
        assert!(matches!(
            updates.recv().await.unwrap(),
            AnalysisUpdate::EngineStopped { crashed: true }
        ));
    }

    #[tokio::test]
    async fn detailed_evaluation_times_out_and_resumes() {
        let (tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
        let settings = AnalysisSettings {
            eval_timeout_ms: 50,
            ..AnalysisSettings::default()
        };
        let coordinator = AnalysisCoordinator::new(ScriptedBackend::default(), rx, settings);
        let position = after(&["e4"]);
        coordinator.on_position_changed(position.clone()).unwrap();

        let err = coordinator
            .evaluate_detailed(&position.position)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));

        let calls = coordinator.backend().calls();
        assert!(calls.contains(&"go #2 lines 3".to_string()));
        assert!(calls.contains(&"cancel #2".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("go #3 lines 1"));
        drop(tx);
    }

    #[tokio::test]
    async fn crash_fails_a_pending_detailed_evaluation() {
        let (coordinator, events) = coordinator();
        let position = after(&["d4", "Nf6"]);
        coordinator.on_position_changed(position.clone()).unwrap();

        let crash = async {
            tokio::task::yield_now().await;
            let active = coordinator.active_request();
            assert_eq!(active, Some(RequestId(2)));
            events
                .send(SessionEvent::Stopped {
                    active,
                    crashed: true,
                })
                .unwrap();
        };
        let (outcome, ()) = tokio::join!(coordinator.evaluate_detailed(&position.position), crash);

        assert!(matches!(outcome, Err(EngineError::Crashed)), "got {:?}", outcome);
        assert_eq!(coordinator.latest(), None);
    }
}
