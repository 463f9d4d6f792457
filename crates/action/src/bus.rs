//! Action dispatch and the outward-facing session event bus.
//!
//! These are deliberately two different abstractions. The [`ActionBus`] is
//! the *internal* typed channel the reducer and effects dispatch on; the
//! [`EventBus`] is the *external* contract a protocol server subscribes to
//! (state changes, transcripts, backpressure, errors) — the boundary named in
//! the ASR hub's external interfaces.

use crate::action::Action;
use crate::types::{ErrorInfo, FsmState, SessionId, Transcript};
use asrhub_audio::BackpressureLevel;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A subscriber-facing session event, as named in the core's ingress/egress contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChange { from: FsmState, to: FsmState },
    Progress { message: String },
    Backpressure { level: BackpressureLevel, retry_after_ms: Option<u64> },
    TranscriptPartial { transcript: Transcript },
    TranscriptFinal { transcript: Transcript },
    Error { error: ErrorInfo },
}

impl SessionEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            SessionEvent::StateChange { .. } => "session:state_change",
            SessionEvent::Progress { .. } => "session:progress",
            SessionEvent::Backpressure { .. } => "session:backpressure",
            SessionEvent::TranscriptPartial { .. } => "session:transcript_partial",
            SessionEvent::TranscriptFinal { .. } => "session:transcript_final",
            SessionEvent::Error { .. } => "session:error",
        }
    }
}

/// Emits session-scoped events to whatever is subscribed (a protocol server's
/// SSE/WebSocket stream, a test harness, nothing at all).
pub trait EventBus: Send + Sync {
    fn emit(&self, session_id: SessionId, event: SessionEvent);
}

pub type EventBusRef = Arc<dyn EventBus>;

#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub session_id: SessionId,
    pub event: SessionEvent,
}

/// Captures every emitted event for inspection; the harness this crate's own
/// tests and `asrhub-store`'s integration tests run against.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, session_id: SessionId) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, session_id: SessionId, event: SessionEvent) {
        self.events.lock().unwrap().push(EmittedEvent { session_id, event });
    }
}

/// Discards every event. Useful for benchmarking or headless self-tests.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _session_id: SessionId, _event: SessionEvent) {}
}

/// A hook run on every dispatched action before it reaches subscribers, e.g.
/// for audit logging or metrics. Middleware never mutates the action.
pub type Middleware = Box<dyn Fn(&Action) + Send + Sync>;

/// Typed dispatch channel for [`Action`]s with a fixed set of middleware
/// slots run synchronously on every `dispatch` call.
///
/// Mirrors the "reducer + effects" wiring: the store and every effect task
/// hold a `ActionBus` handle and dispatch onto it; nothing dereferences the
/// store itself (see the cyclic-reference note this crate's callers follow).
pub struct ActionBus {
    sender: mpsc::UnboundedSender<Action>,
    middleware: Vec<Middleware>,
}

impl ActionBus {
    /// Build a bus and the receiver the store's dispatch loop consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                middleware: Vec::new(),
            },
            receiver,
        )
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Run middleware, then enqueue the action. Never blocks; the only
    /// failure mode is the receiver having been dropped, which is logged and
    /// otherwise ignored (the process is shutting down).
    pub fn dispatch(&self, action: Action) {
        for mw in &self.middleware {
            mw(&action);
        }
        if self.sender.send(action).is_err() {
            tracing::debug!("action dispatched after store shutdown, dropping");
        }
    }

    /// A cheap, cloneable dispatch-only handle, for effects that must not see
    /// the middleware chain itself or hold anything beyond "dispatch + clone".
    pub fn handle(&self) -> ActionBusHandle {
        ActionBusHandle {
            sender: self.sender.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ActionBusHandle {
    sender: mpsc::UnboundedSender<Action>,
}

impl ActionBusHandle {
    pub fn dispatch(&self, action: Action) {
        if self.sender.send(action).is_err() {
            tracing::debug!("action dispatched after store shutdown, dropping");
        }
    }
}
