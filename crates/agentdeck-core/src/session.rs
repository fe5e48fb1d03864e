use std::sync::Arc;
use std::time::Duration;

use agentdeck_observability::{emit_event, redact_text, ObservabilityEvent, ProcessKind};
use agentdeck_wire::{Mode, TraceEvent};
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use uuid::Uuid;

use crate::error::{DeckError, Result};
use crate::messages::{ChatMessage, MessageLog};
use crate::normalize::normalize;
use crate::transport::{SignalStream, StreamRequest, StreamSignal, TraceTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
}

/// The two UI-facing flags. Both are derived from the phase, so they can never
/// disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags {
    pub loading: bool,
    pub streaming: bool,
}

impl SessionPhase {
    pub fn flags(self) -> SessionFlags {
        let active = self == SessionPhase::Active;
        SessionFlags {
            loading: active,
            streaming: active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    Completed,
    AgentError,
    TransportFailed,
    Cancelled,
    Stalled,
}

impl TurnEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnEnd::Completed => "completed",
            TurnEnd::AgentError => "agent_error",
            TurnEnd::TransportFailed => "transport_failed",
            TurnEnd::Cancelled => "cancelled",
            TurnEnd::Stalled => "stalled",
        }
    }

    /// A stall is reported as a transport failure to the user.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TurnEnd::AgentError | TurnEnd::TransportFailed | TurnEnd::Stalled
        )
    }
}

/// Result of feeding one input into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// A message was appended at this log index.
    Appended(usize),
    /// An undecodable payload was dropped.
    Skipped,
    /// The session was idle, so the input could not touch state.
    Ignored,
    Finished(TurnEnd),
}

// ============================================================================
// Transition core
// ============================================================================

/// Message log plus phase, with no I/O. Every state change goes through
/// `begin_turn`, `apply`, `finish` or `reset`.
#[derive(Debug, Default)]
pub struct SessionCore {
    log: MessageLog,
    phase: SessionPhase,
}

impl SessionCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn flags(&self) -> SessionFlags {
        self.phase.flags()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Records the user's prompt and moves to `Active`. Returns the log index of
    /// the prompt.
    pub fn begin_turn(&mut self, text: &str) -> Result<usize> {
        if self.phase == SessionPhase::Active {
            return Err(DeckError::TurnInFlight);
        }
        if text.trim().is_empty() {
            return Err(DeckError::EmptyPrompt);
        }
        let index = self.log.append(ChatMessage::user(text));
        self.phase = SessionPhase::Active;
        Ok(index)
    }

    pub fn apply(&mut self, signal: StreamSignal) -> Update {
        if self.phase == SessionPhase::Idle {
            return Update::Ignored;
        }
        match signal {
            StreamSignal::Event(TraceEvent::Message { node, content }) => {
                let text = normalize(&content);
                Update::Appended(self.log.append(ChatMessage::assistant(node, text)))
            }
            StreamSignal::Event(TraceEvent::End) => self.finish(TurnEnd::Completed),
            StreamSignal::Event(TraceEvent::Error { message }) => {
                self.log
                    .append(ChatMessage::assistant_notice(format!("Error: {message}")));
                self.finish(TurnEnd::AgentError)
            }
            StreamSignal::Malformed { payload, reason } => {
                tracing::warn!(
                    "Skipping undecodable trace event ({}): {}",
                    reason,
                    payload.chars().take(200).collect::<String>()
                );
                Update::Skipped
            }
            StreamSignal::Failed(reason) => {
                tracing::warn!("Chat stream failed: {}", reason);
                self.finish(TurnEnd::TransportFailed)
            }
        }
    }

    /// Ends the active turn. Appends nothing.
    pub fn finish(&mut self, end: TurnEnd) -> Update {
        if self.phase == SessionPhase::Idle {
            return Update::Ignored;
        }
        self.phase = SessionPhase::Idle;
        Update::Finished(end)
    }

    pub fn reset(&mut self) {
        self.log.reset();
        self.phase = SessionPhase::Idle;
    }
}

// ============================================================================
// Turn stream
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    Signal(StreamSignal),
    /// The server closed the stream.
    Closed,
    Stalled,
    Cancelled,
}

/// The one open event stream of a turn. Released exactly once: by `close`, or on
/// drop if nobody closed it.
pub struct TurnStream {
    id: Uuid,
    signals: Option<SignalStream>,
    cancel: CancellationToken,
    stall_timeout: Option<Duration>,
    last_progress: Instant,
}

impl TurnStream {
    pub fn new(signals: SignalStream, stall_timeout: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            signals: Some(signals),
            cancel: CancellationToken::new(),
            stall_timeout,
            last_progress: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.signals.is_some()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the next input. Cancel-safe: dropping the future loses nothing
    /// and does not move the stall deadline.
    pub async fn next(&mut self) -> TurnInput {
        let deadline = self.stall_timeout.map(|stall| self.last_progress + stall);
        let Some(signals) = self.signals.as_mut() else {
            return TurnInput::Closed;
        };

        let next = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, signals.next()).await.ok(),
                None => Some(signals.next().await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => TurnInput::Cancelled,
            polled = next => match polled {
                None => TurnInput::Stalled,
                Some(None) => TurnInput::Closed,
                Some(Some(signal)) => {
                    self.last_progress = Instant::now();
                    TurnInput::Signal(signal)
                }
            },
        }
    }

    /// Releases the underlying connection. Returns true only for the call that
    /// actually released it.
    pub fn close(&mut self) -> bool {
        match self.signals.take() {
            Some(signals) => {
                drop(signals);
                tracing::debug!("Released chat stream {}", self.id);
                true
            }
            None => false,
        }
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Held while a turn's stream is being opened. If the `send` future is dropped
/// before the open resolves, the turn ends here instead of staying `Active`
/// with no stream behind it.
struct OpeningTurn<'a> {
    core: &'a mut SessionCore,
    thread_id: &'a str,
    process: ProcessKind,
    armed: bool,
}

impl OpeningTurn<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OpeningTurn<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Chat stream open was abandoned; ending turn");
        if let Update::Finished(end) = self.core.finish(TurnEnd::Cancelled) {
            log_turn_end(self.process, self.thread_id, end, None);
        }
    }
}

/// Owns the trace log and at most one in-flight turn.
pub struct SessionController<T: TraceTransport + ?Sized> {
    transport: Arc<T>,
    core: SessionCore,
    active: Option<TurnStream>,
    thread_id: String,
    stall_timeout: Option<Duration>,
    open_timeout: Option<Duration>,
    process: ProcessKind,
}

impl<T: TraceTransport + ?Sized> SessionController<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            core: SessionCore::new(),
            active: None,
            thread_id: Uuid::new_v4().to_string(),
            stall_timeout: None,
            open_timeout: None,
            process: ProcessKind::Tui,
        }
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Option<Duration>) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Bounds the wait for the stream's response headers.
    pub fn with_open_timeout(mut self, open_timeout: Option<Duration>) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    pub fn with_process(mut self, process: ProcessKind) -> Self {
        self.process = process;
        self
    }

    pub fn messages(&self) -> &MessageLog {
        self.core.log()
    }

    pub fn flags(&self) -> SessionFlags {
        self.core.flags()
    }

    pub fn phase(&self) -> SessionPhase {
        self.core.phase()
    }

    pub fn is_active(&self) -> bool {
        self.core.phase() == SessionPhase::Active
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Token that ends the in-flight turn from elsewhere, e.g. a Ctrl-C handler.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(TurnStream::cancel_token)
    }

    /// Starts a turn. The prompt is in the log before the stream is opened; if
    /// opening fails, times out, or this future is dropped first, the session is
    /// back to idle.
    pub async fn send(&mut self, text: &str, mode: Mode) -> Result<()> {
        self.core.begin_turn(text)?;

        let prompt = redact_text(text);
        emit_event(
            Level::INFO,
            self.process,
            ObservabilityEvent {
                event: "turn.started",
                component: "session",
                thread_id: Some(&self.thread_id),
                status: Some(mode.as_str()),
                detail: Some(&prompt),
                ..Default::default()
            },
        );

        let request = StreamRequest {
            message: text.to_string(),
            mode,
            thread_id: Some(self.thread_id.clone()),
        };
        let opening = OpeningTurn {
            core: &mut self.core,
            thread_id: &self.thread_id,
            process: self.process,
            armed: true,
        };
        let open = self.transport.open_stream(&request);
        let opened = match self.open_timeout {
            Some(limit) => tokio::time::timeout(limit, open)
                .await
                .unwrap_or_else(|_| Err(DeckError::OpenTimedOut(limit))),
            None => open.await,
        };
        opening.disarm();

        match opened {
            Ok(signals) => {
                self.active = Some(TurnStream::new(signals, self.stall_timeout));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to open chat stream: {}", e);
                self.core.finish(TurnEnd::TransportFailed);
                self.log_turn_end(TurnEnd::TransportFailed, None);
                Err(e)
            }
        }
    }

    /// Processes the next input of the active turn. `None` when no turn is open.
    pub async fn next_update(&mut self) -> Option<Update> {
        let turn = self.active.as_mut()?;
        let update = match turn.next().await {
            TurnInput::Signal(signal) => {
                if let StreamSignal::Event(event) = &signal {
                    tracing::debug!("Trace event: {}", event.kind());
                }
                self.core.apply(signal)
            }
            TurnInput::Closed => {
                tracing::warn!("Chat stream closed before a terminal event");
                self.core.finish(TurnEnd::TransportFailed)
            }
            TurnInput::Stalled => {
                tracing::warn!(
                    "Chat stream stalled for {:?}; ending turn",
                    self.stall_timeout.unwrap_or_default()
                );
                self.core.finish(TurnEnd::Stalled)
            }
            TurnInput::Cancelled => self.core.finish(TurnEnd::Cancelled),
        };
        if let Update::Finished(end) = update {
            self.release(end);
        }
        Some(update)
    }

    /// Drives the active turn until it ends. `None` if no turn was open.
    pub async fn run_to_idle(&mut self) -> Option<TurnEnd> {
        while let Some(update) = self.next_update().await {
            if let Update::Finished(end) = update {
                return Some(end);
            }
        }
        None
    }

    /// Abandons the in-flight turn without appending anything.
    pub fn cancel(&mut self) -> bool {
        if self.active.is_none() && !self.is_active() {
            return false;
        }
        self.core.finish(TurnEnd::Cancelled);
        self.release(TurnEnd::Cancelled);
        true
    }

    /// Starts a fresh conversation on a new thread.
    pub fn reset(&mut self) {
        self.cancel();
        self.core.reset();
        self.thread_id = Uuid::new_v4().to_string();
        tracing::info!("Started new chat thread {}", self.thread_id);
    }

    fn release(&mut self, end: TurnEnd) {
        let turn_id = self.active.take().map(|mut turn| {
            turn.close();
            turn.id().to_string()
        });
        self.log_turn_end(end, turn_id.as_deref());
    }

    fn log_turn_end(&self, end: TurnEnd, turn_id: Option<&str>) {
        log_turn_end(self.process, &self.thread_id, end, turn_id);
    }
}

fn log_turn_end(process: ProcessKind, thread_id: &str, end: TurnEnd, turn_id: Option<&str>) {
    let level = if end.is_failure() {
        Level::WARN
    } else {
        Level::INFO
    };
    emit_event(
        level,
        process,
        ObservabilityEvent {
            event: "turn.finished",
            component: "session",
            thread_id: Some(thread_id),
            turn_id,
            status: Some(end.as_str()),
            ..Default::default()
        },
    );
}
