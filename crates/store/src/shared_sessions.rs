//! The session map, shared between the store (which writes it through the
//! reducer) and the pipeline orchestrator (which only ever reads FSM state
//! off it). Handing both sides the same `Arc<SharedSessions>` instead of
//! nesting one inside the other avoids the store/effects cyclic reference:
//! the pipeline never holds a `SessionStore`, only this narrow read surface.

use asrhub_action::{FsmState, SessionId};
use asrhub_session::Session;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct SharedSessions {
    inner: RwLock<HashMap<SessionId, Session>>,
}

impl SharedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.inner.read().unwrap().contains_key(&session_id)
    }

    pub fn get(&self, session_id: SessionId) -> Option<Session> {
        self.inner.read().unwrap().get(&session_id).cloned()
    }

    pub fn insert(&self, session: Session) {
        self.inner.write().unwrap().insert(session.id, session);
    }

    pub fn remove(&self, session_id: SessionId) -> Option<Session> {
        self.inner.write().unwrap().remove(&session_id)
    }

    pub fn list(&self) -> Vec<Session> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Apply `f` to the session's current value and install the result,
    /// mirroring the reducer's "read, transform, install atomically" shape.
    /// A no-op if the session does not exist.
    pub fn update(&self, session_id: SessionId, f: impl FnOnce(Session) -> Session) {
        let mut guard = self.inner.write().unwrap();
        if let Some(session) = guard.remove(&session_id) {
            guard.insert(session_id, f(session));
        }
    }
}

impl asrhub_pipeline::StateProvider for SharedSessions {
    fn current_state(&self, session_id: SessionId) -> Option<FsmState> {
        self.inner.read().unwrap().get(&session_id).map(|s| s.fsm_state)
    }
}
