//! Engine session: one external UCI process and its request state.
//!
//! The session writes commands through a stdin writer task and parses the
//! engine's output on a reader task. Replies are correlated with requests in
//! FIFO order: every `go` is answered by exactly one `bestmove`, and `info`
//! lines belong to the oldest request still waiting for its `bestmove`.
//! A request that has been superseded or cancelled stays in the queue until
//! its `bestmove` arrives, but nothing it produces is reported.

use crate::analysis::{AnalysisResult, Evaluation, PvLine, RequestId, SearchLimit};
use crate::config::EngineConfig;
use crate::error::EngineError;
use chess_core::Color;
use chess_rules::{Fingerprint, GameTimeline, Position};
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use uci::{EngineInfo, EngineMessage, GuiCommand};

/// How long `stop` waits for the engine to honour `quit` before killing it.
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Ready,
    Analyzing,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Analyzing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Analyzing => "analyzing",
        };
        f.write_str(name)
    }
}

/// Pushed by the reader task as the engine reports.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Intermediate search output for a live request.
    Progress {
        request: RequestId,
        result: AnalysisResult,
    },
    /// The engine's final answer for a live request.
    Finished {
        request: RequestId,
        result: AnalysisResult,
    },
    /// The process is gone. `active` is the request that was in flight.
    Stopped {
        active: Option<RequestId>,
        crashed: bool,
    },
}

/// A position as the engine is told about it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePosition {
    /// `None` for the standard starting position.
    pub start_fen: Option<String>,
    /// Moves from the start, in coordinate notation.
    pub moves: Vec<String>,
    /// The position reached after `moves`.
    pub position: Position,
}

impl EnginePosition {
    /// A bare position, sent as FEN without moves.
    pub fn from_position(position: Position) -> Self {
        Self {
            start_fen: (position != Position::startpos()).then(|| position.to_fen()),
            moves: Vec::new(),
            position,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.position.fingerprint()
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    pub fn to_command(&self) -> GuiCommand {
        GuiCommand::Position {
            fen: self.start_fen.clone(),
            moves: self.moves.clone(),
        }
    }
}

impl From<&GameTimeline> for EnginePosition {
    /// The game's start plus the moves up to the cursor.
    fn from(timeline: &GameTimeline) -> Self {
        let start = timeline.start_position();
        Self {
            start_fen: (start != Position::startpos()).then(|| start.to_fen()),
            moves: timeline.history().iter().map(|m| m.to_uci()).collect(),
            position: timeline.current_position(),
        }
    }
}

/// What a component that issues analysis needs from an engine.
///
/// Everything here returns without waiting on the engine; results come back
/// through the session's event channel.
pub trait AnalysisBackend: Send + Sync + 'static {
    fn state(&self) -> SessionState;

    /// Sends the position, superseding any search in flight.
    fn set_position(&self, position: &EnginePosition) -> Result<(), EngineError>;

    /// Starts a search on the last position sent.
    fn request_analysis(&self, limit: &SearchLimit) -> Result<RequestId, EngineError>;

    /// Best effort: stops the search and drops anything it still reports.
    fn cancel(&self, request: RequestId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    UciOk,
    ReadyOk,
}

/// A `go` still waiting for its `bestmove`.
struct Outstanding {
    id: RequestId,
    fingerprint: Fingerprint,
    side_to_move: Color,
    superseded: bool,
    depth: u32,
    nodes: Option<u64>,
    lines: Vec<PvLine>,
}

impl Outstanding {
    fn new(id: RequestId, fingerprint: Fingerprint, side_to_move: Color) -> Self {
        Self {
            id,
            fingerprint,
            side_to_move,
            superseded: false,
            depth: 0,
            nodes: None,
            lines: Vec::new(),
        }
    }

    /// Folds an info line in. Returns true when it carried an exact score.
    fn absorb(&mut self, info: &EngineInfo) -> bool {
        if info.nodes.is_some() {
            self.nodes = info.nodes;
        }
        let Some(score) = info.score.filter(|_| info.bound.is_none()) else {
            return false;
        };

        let rank = info.multipv.unwrap_or(1).max(1);
        let depth = info.depth.unwrap_or(self.depth);
        if rank == 1 {
            self.depth = self.depth.max(depth);
        }

        let line = PvLine {
            rank,
            evaluation: Evaluation::from_score(score, self.side_to_move),
            depth,
            moves: info.pv.clone(),
        };
        match self.lines.iter_mut().find(|l| l.rank == rank) {
            Some(existing) => *existing = line,
            None => {
                self.lines.push(line);
                self.lines.sort_by_key(|l| l.rank);
            }
        }
        true
    }

    fn snapshot(&self, best_move: Option<String>, is_final: bool) -> AnalysisResult {
        AnalysisResult {
            request: self.id,
            fingerprint: self.fingerprint,
            best_move,
            evaluation: self.lines.first().map(|l| l.evaluation),
            depth: self.depth,
            nodes: self.nodes,
            lines: self.lines.clone(),
            timestamp: Utc::now(),
            is_final,
        }
    }
}

struct Shared {
    state: SessionState,
    /// Bumped on every spawn and stop; reader tasks of older processes
    /// compare against it and go quiet.
    generation: u64,
    stdin: Option<mpsc::UnboundedSender<String>>,
    engine_name: Option<String>,
    next_request: u64,
    position: Option<(Fingerprint, Color)>,
    multipv: u32,
    active: Option<RequestId>,
    outstanding: VecDeque<Outstanding>,
    pending_ack: Option<(Ack, oneshot::Sender<()>)>,
}

impl Shared {
    fn send(&self, command: &GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        let stdin = self
            .stdin
            .as_ref()
            .ok_or(EngineError::NotRunning(self.state))?;
        tracing::debug!(">> {}", line);
        stdin.send(line).map_err(|_| EngineError::Crashed)
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.state.is_running() {
            Ok(())
        } else {
            Err(EngineError::NotRunning(self.state))
        }
    }

    /// Marks `request` superseded and stops the search if it is the active one.
    fn supersede(&mut self, request: RequestId) {
        let Some(entry) = self
            .outstanding
            .iter_mut()
            .find(|o| o.id == request && !o.superseded)
        else {
            return;
        };
        entry.superseded = true;

        if self.active == Some(request) {
            self.active = None;
            self.state = SessionState::Ready;
            if let Err(e) = self.send(&GuiCommand::Stop) {
                tracing::debug!("Could not send stop for {}: {}", request, e);
            }
        }
    }

    /// Forgets everything about the current process.
    fn reset(&mut self) -> Option<RequestId> {
        self.generation += 1;
        self.state = SessionState::Stopped;
        self.stdin = None;
        self.position = None;
        self.pending_ack = None;
        self.outstanding.clear();
        self.active.take()
    }
}

/// One external engine process, restartable.
pub struct EngineSession {
    config: EngineConfig,
    shared: Arc<Mutex<Shared>>,
    child: tokio::sync::Mutex<Option<Child>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl EngineSession {
    /// Creates a stopped session and the channel its events arrive on.
    pub fn new(config: EngineConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            state: SessionState::Stopped,
            generation: 0,
            stdin: None,
            engine_name: None,
            next_request: 0,
            position: None,
            multipv: 1,
            active: None,
            outstanding: VecDeque::new(),
            pending_ack: None,
        };
        let session = Self {
            config,
            shared: Arc::new(Mutex::new(shared)),
            child: tokio::sync::Mutex::new(None),
            events,
        };
        (session, rx)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The name from `id name`, once the handshake has seen it.
    pub fn engine_name(&self) -> Option<String> {
        self.lock().engine_name.clone()
    }

    /// The request currently being searched, if any.
    pub fn active_request(&self) -> Option<RequestId> {
        self.lock().active
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the engine and completes the handshake.
    ///
    /// Does nothing when the engine is already running. A process left
    /// behind by a crash is reaped first.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut child_slot = self.child.lock().await;
        if self.lock().state.is_running() {
            return Ok(());
        }

        if let Some(mut dead) = child_slot.take() {
            let _ = dead.kill().await;
            let _ = dead.wait().await;
        }

        tracing::info!("Starting engine: {} {}", self.config.path, self.config.args.join(" "));
        let mut child = Command::new(&self.config.path)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout unavailable"))?;

        // Channel for sending commands to stdin
        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let mut stdin_writer = stdin;
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                if stdin_writer.write_all(cmd.as_bytes()).await.is_err() {
                    break;
                }
                if stdin_writer.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin_writer.flush().await.is_err() {
                    break;
                }
            }
        });

        let generation = {
            let mut shared = self.lock();
            shared.reset();
            shared.state = SessionState::Starting;
            shared.stdin = Some(stdin_tx);
            shared.engine_name = None;
            shared.multipv = 1;
            shared.generation
        };
        spawn_reader(stdout, Arc::clone(&self.shared), self.events.clone(), generation);
        *child_slot = Some(child);

        match self.handshake().await {
            Ok(()) => {
                let mut shared = self.lock();
                shared.state = SessionState::Ready;
                tracing::info!(
                    "Engine ready: {}",
                    shared.engine_name.as_deref().unwrap_or("unknown engine")
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Engine handshake failed: {}", e);
                self.lock().reset();
                if let Some(mut child) = child_slot.take() {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<(), EngineError> {
        let timeout = self.config.handshake_timeout();

        let uciok = self.expect(Ack::UciOk, &GuiCommand::Uci)?;
        wait_ack(uciok, timeout, "uciok").await?;

        for (name, value) in self.config.uci_options() {
            self.lock().send(&GuiCommand::SetOption {
                name,
                value: Some(value),
            })?;
        }

        let readyok = self.expect(Ack::ReadyOk, &GuiCommand::IsReady)?;
        wait_ack(readyok, timeout, "readyok").await
    }

    /// Registers interest in `ack`, then sends `command`.
    fn expect(&self, ack: Ack, command: &GuiCommand) -> Result<oneshot::Receiver<()>, EngineError> {
        let (tx, rx) = oneshot::channel();
        let mut shared = self.lock();
        shared.pending_ack = Some((ack, tx));
        shared.send(command)?;
        Ok(rx)
    }

    /// Terminates the engine. Safe to call in any state.
    pub async fn stop(&self) {
        let mut child_slot = self.child.lock().await;
        let (active, stdin, was_running) = {
            let mut shared = self.lock();
            let was_running = shared.state != SessionState::Stopped;
            let stdin = shared.stdin.take();
            (shared.reset(), stdin, was_running)
        };

        if let Some(stdin) = stdin {
            tracing::debug!(">> quit");
            let _ = stdin.send(GuiCommand::Quit.to_uci());
        }

        if let Some(mut child) = child_slot.take() {
            match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!("Engine ignored quit, killing it");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        if was_running {
            tracing::info!("Engine stopped");
            let _ = self.events.send(SessionEvent::Stopped {
                active,
                crashed: false,
            });
        }
    }

    /// Tells the engine the next positions belong to a new game.
    pub fn new_game(&self) -> Result<(), EngineError> {
        let shared = self.lock();
        shared.ensure_running()?;
        shared.send(&GuiCommand::UciNewGame)
    }
}

impl AnalysisBackend for EngineSession {
    fn state(&self) -> SessionState {
        self.lock().state
    }

    fn set_position(&self, position: &EnginePosition) -> Result<(), EngineError> {
        let mut shared = self.lock();
        shared.ensure_running()?;
        if let Some(active) = shared.active {
            shared.supersede(active);
        }
        shared.send(&position.to_command())?;
        shared.position = Some((position.fingerprint(), position.side_to_move()));
        Ok(())
    }

    fn request_analysis(&self, limit: &SearchLimit) -> Result<RequestId, EngineError> {
        let mut shared = self.lock();
        shared.ensure_running()?;
        let (fingerprint, side_to_move) = shared.position.ok_or(EngineError::NoPosition)?;

        if let Some(active) = shared.active {
            shared.supersede(active);
        }
        if limit.lines != shared.multipv {
            shared.send(&GuiCommand::SetOption {
                name: "MultiPV".to_string(),
                value: Some(limit.lines.to_string()),
            })?;
            shared.multipv = limit.lines;
        }

        shared.next_request += 1;
        let id = RequestId(shared.next_request);
        shared.send(&GuiCommand::Go(limit.to_go()))?;
        shared
            .outstanding
            .push_back(Outstanding::new(id, fingerprint, side_to_move));
        shared.active = Some(id);
        shared.state = SessionState::Analyzing;
        tracing::debug!("Analysis {} requested for {}", id, fingerprint);
        Ok(id)
    }

    fn cancel(&self, request: RequestId) {
        self.lock().supersede(request);
    }
}

async fn wait_ack(
    rx: oneshot::Receiver<()>,
    timeout: Duration,
    what: &str,
) -> Result<(), EngineError> {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(EngineError::Handshake(format!(
            "engine exited before {}",
            what
        ))),
        Err(_) => Err(EngineError::Handshake(format!(
            "no {} within {:?}",
            what, timeout
        ))),
    }
}

fn spawn_reader(
    stdout: ChildStdout,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) {
    tokio::spawn(async move {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => handle_line(&shared, &events, generation, &line),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Engine output unreadable: {}", e);
                    break;
                }
            }
        }
        handle_exit(&shared, &events, generation);
    });
}

fn handle_line(
    shared: &Mutex<Shared>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
    line: &str,
) {
    let Some(message) = EngineMessage::parse(line) else {
        tracing::trace!("Ignoring engine output: {}", line);
        return;
    };

    let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if shared.generation != generation {
        return;
    }
    tracing::debug!("<< {}", line);

    match message {
        EngineMessage::Id { name: Some(name), .. } => shared.engine_name = Some(name),
        EngineMessage::Id { .. } => {}
        EngineMessage::UciOk => acknowledge(&mut shared, Ack::UciOk),
        EngineMessage::ReadyOk => acknowledge(&mut shared, Ack::ReadyOk),
        EngineMessage::Info(info) => {
            let Some(front) = shared.outstanding.front_mut() else {
                return;
            };
            if front.absorb(&info) && !front.superseded {
                let result = front.snapshot(None, false);
                let _ = events.send(SessionEvent::Progress {
                    request: front.id,
                    result,
                });
            }
        }
        EngineMessage::BestMove { mv, .. } => {
            let Some(done) = shared.outstanding.pop_front() else {
                tracing::trace!("bestmove without a pending request");
                return;
            };
            if shared.active == Some(done.id) {
                shared.active = None;
                shared.state = SessionState::Ready;
            }
            if done.superseded {
                tracing::debug!("Dropping reply to superseded request {}", done.id);
                return;
            }
            let result = done.snapshot(mv, true);
            let _ = events.send(SessionEvent::Finished {
                request: done.id,
                result,
            });
        }
    }
}

fn acknowledge(shared: &mut Shared, ack: Ack) {
    match shared.pending_ack.take() {
        Some((expected, tx)) if expected == ack => {
            let _ = tx.send(());
        }
        other => shared.pending_ack = other,
    }
}

fn handle_exit(
    shared: &Mutex<Shared>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) {
    let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if shared.generation != generation {
        return;
    }
    let was_running = shared.state.is_running();
    let active = shared.reset();
    if was_running {
        tracing::warn!("Engine process exited unexpectedly");
        let _ = events.send(SessionEvent::Stopped {
            active,
            crashed: true,
        });
    }
}
