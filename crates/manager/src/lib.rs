//! Thin operation set for protocol servers: create/destroy/inspect/activate
//! sessions and reset the idle timer. Every write is a dispatch onto the
//! action bus; reads go straight to the store's session map. Nothing here
//! waits on the pipeline or the provider pool — a slow transcription or a
//! starved pool never blocks a caller of this facade.

use asrhub_action::{Action, ActionBusHandle, SessionId, Strategy};
use asrhub_session::SessionSnapshot;
use asrhub_store::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a caller supplies at session creation, independent of the
/// store's internal `CreateSessionOptions` (which also carries fields the
/// action stream has no slot for, e.g. a fresh `SessionId`).
#[derive(Debug, Clone)]
pub struct NewSession {
    pub strategy: Strategy,
    pub priority: u32,
    pub metadata: HashMap<String, String>,
}

impl Default for NewSession {
    fn default() -> Self {
        Self { strategy: Strategy::NonStreaming, priority: 0, metadata: HashMap::new() }
    }
}

pub struct SessionManager {
    store: Arc<SessionStore>,
    bus: ActionBusHandle,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>, bus: ActionBusHandle) -> Self {
        Self { store, bus }
    }

    /// Allocates an id and dispatches `create_session`. The id is valid
    /// immediately for `get_session`/`touch`/etc, but the session itself
    /// only exists once the store's dispatch loop processes the action —
    /// callers that need to observe the outcome (e.g. a `max_sessions`
    /// rejection) subscribe to the event bus rather than polling this call.
    pub fn create_session(&self, new: NewSession) -> SessionId {
        let session_id = SessionId::new();
        self.bus.dispatch(Action::CreateSession {
            session_id,
            strategy: new.strategy,
            priority: new.priority,
            metadata: new.metadata,
        });
        session_id
    }

    pub fn destroy_session(&self, session_id: SessionId) {
        self.bus.dispatch(Action::DestroySession { session_id });
    }

    pub fn get_session(&self, session_id: SessionId) -> Option<SessionSnapshot> {
        self.store.get(session_id).map(|s| s.snapshot())
    }

    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        self.store.list().into_iter().map(|s| s.snapshot()).collect()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.store.active_session_id()
    }

    pub fn set_active(&self, session_id: SessionId) {
        self.store.set_active(session_id);
    }

    /// Resets the session's idle timer without otherwise touching its state.
    pub fn touch(&self, session_id: SessionId) {
        self.bus.dispatch(Action::Touch { session_id });
    }
}
