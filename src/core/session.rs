//! Purpose: Drive one SSE subscription from connect to a terminal verdict.
//! Exports: `SessionState`, `SessionInput`, `Budget`, `transition`, `run_session`.
//! Role: Owns the decoder -> parser -> validator loop for a single stream.
//! Invariants: `transition` is pure; terminal states absorb every input.
//! Invariants: Only `Satisfied` yields a true verdict, so a verdict never reverts.
//! Invariants: The deadline is re-checked after every read and every frame.
//! Invariants: The transport reader is dropped on every exit path of `run_session`.
use crate::core::error::Error;
use crate::core::event::parse_event;
use crate::core::frame::FrameReader;
use crate::core::validate::{PayloadIssue, PayloadKind};
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_EVENTS: usize = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionLimits {
    pub deadline: Duration,
    pub max_events: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

/// Absolute limits for one session, fixed when the session starts.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    pub deadline: Instant,
    pub max_events: usize,
}

impl Budget {
    pub fn starting_at(start: Instant, limits: SessionLimits) -> Self {
        Self {
            deadline: start + limits.deadline,
            max_events: limits.max_events,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Connecting,
    /// `observed` counts complete events that failed validation so far.
    Streaming {
        observed: usize,
    },
    Satisfied,
    TimedOut,
    Exhausted,
    /// The server ended the stream before any event validated.
    Closed,
    ConnectionFailed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            SessionState::Connecting | SessionState::Streaming { .. }
        )
    }

    pub fn verdict(self) -> bool {
        self == SessionState::Satisfied
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Streaming { .. } => "streaming",
            SessionState::Satisfied => "satisfied",
            SessionState::TimedOut => "timed_out",
            SessionState::Exhausted => "exhausted",
            SessionState::Closed => "closed",
            SessionState::ConnectionFailed => "connection_failed",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum SessionInput {
    Opened,
    OpenFailed,
    /// A complete event (name and data both set) was checked.
    Event {
        valid: bool,
    },
    Clock {
        now: Instant,
    },
    EndOfStream,
}

pub fn transition(state: SessionState, input: SessionInput, budget: &Budget) -> SessionState {
    match (state, input) {
        (SessionState::Connecting, SessionInput::Opened) => {
            SessionState::Streaming { observed: 0 }
        }
        (SessionState::Connecting, SessionInput::OpenFailed) => SessionState::ConnectionFailed,
        (SessionState::Streaming { .. }, SessionInput::Event { valid: true }) => {
            SessionState::Satisfied
        }
        (SessionState::Streaming { observed }, SessionInput::Event { valid: false }) => {
            let observed = observed + 1;
            if observed >= budget.max_events {
                SessionState::Exhausted
            } else {
                SessionState::Streaming { observed }
            }
        }
        (SessionState::Streaming { .. }, SessionInput::Clock { now }) if now > budget.deadline => {
            SessionState::TimedOut
        }
        (SessionState::Streaming { .. }, SessionInput::EndOfStream) => SessionState::Closed,
        (state, _) => state,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamVerdict {
    pub observed_valid: bool,
}

#[derive(Clone, Debug)]
pub struct SessionOutcome {
    pub kind: PayloadKind,
    pub state: SessionState,
    pub events_observed: usize,
    pub frames_seen: usize,
    pub elapsed: Duration,
    pub summary: Option<String>,
    pub last_issue: Option<PayloadIssue>,
    pub error: Option<String>,
}

impl SessionOutcome {
    pub fn verdict(&self) -> StreamVerdict {
        StreamVerdict {
            observed_valid: self.state.verdict(),
        }
    }
}

/// Runs one session: `open` connects, then frames are consumed until a terminal state.
pub fn run_session<R, F>(kind: PayloadKind, limits: SessionLimits, open: F) -> SessionOutcome
where
    R: Read,
    F: FnOnce() -> Result<R, Error>,
{
    let started = Instant::now();
    let mut session = Session::new(kind, Budget::starting_at(started, limits));

    match open() {
        Ok(reader) => {
            session.apply(SessionInput::Opened);
            session.consume(FrameReader::new(reader));
        }
        Err(err) => {
            warn!(stream = kind.label(), error = %err, "stream connection failed");
            session.error = Some(err.to_string());
            session.apply(SessionInput::OpenFailed);
        }
    }

    let outcome = session.finish(started.elapsed());
    info!(
        stream = kind.label(),
        state = outcome.state.label(),
        events = outcome.events_observed,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "stream session finished"
    );
    outcome
}

struct Session {
    kind: PayloadKind,
    budget: Budget,
    state: SessionState,
    events_observed: usize,
    frames_seen: usize,
    summary: Option<String>,
    last_issue: Option<PayloadIssue>,
    error: Option<String>,
}

impl Session {
    fn new(kind: PayloadKind, budget: Budget) -> Self {
        Self {
            kind,
            budget,
            state: SessionState::Connecting,
            events_observed: 0,
            frames_seen: 0,
            summary: None,
            last_issue: None,
            error: None,
        }
    }

    fn apply(&mut self, input: SessionInput) {
        self.state = transition(self.state, input, &self.budget);
    }

    fn tick(&mut self) {
        self.apply(SessionInput::Clock {
            now: Instant::now(),
        });
    }

    fn consume<R: Read>(&mut self, mut frames: FrameReader<R>) {
        while !self.state.is_terminal() {
            let batch = match frames.read_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    self.apply(SessionInput::EndOfStream);
                    break;
                }
                Err(err) => {
                    // A transport read timeout lands here once the deadline passes.
                    self.tick();
                    if !self.state.is_terminal() {
                        warn!(stream = self.kind.label(), error = %err, "stream read failed");
                        self.error = Some(err.to_string());
                        self.apply(SessionInput::EndOfStream);
                    }
                    break;
                }
            };

            for frame in batch {
                self.observe(&frame);
                if self.state.is_terminal() {
                    break;
                }
                self.tick();
                if self.state.is_terminal() {
                    break;
                }
            }
            self.tick();
        }
    }

    fn observe(&mut self, frame: &str) {
        self.frames_seen += 1;
        let event = parse_event(frame);
        if !event.is_complete() {
            debug!(stream = self.kind.label(), "skipping frame without event name or data");
            return;
        }
        self.events_observed += 1;

        let valid = match self.kind.inspect(&event.data) {
            Ok(object) => {
                self.summary = self.kind.summarize(&object);
                debug!(stream = self.kind.label(), event = %event.name, "payload accepted");
                true
            }
            Err(issue) => {
                debug!(stream = self.kind.label(), event = %event.name, %issue, "payload rejected");
                self.last_issue = Some(issue);
                false
            }
        };
        self.apply(SessionInput::Event { valid });
    }

    fn finish(self, elapsed: Duration) -> SessionOutcome {
        SessionOutcome {
            kind: self.kind,
            state: self.state,
            events_observed: self.events_observed,
            frames_seen: self.frames_seen,
            elapsed,
            summary: self.summary,
            last_issue: self.last_issue,
            error: self.error,
        }
    }
}
