//! The timer service: one cancellation token per `(session_id, name)`.

use crate::config::{TimerConfig, TimerDuration};
use asrhub_action::{Action, ActionBusHandle, SessionId, TimerName};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Dispatches the stored action through the action bus on expiry; never
/// invokes caller code directly. At most one timer exists per
/// `(session_id, name)` — re-`start`ing cancels and replaces the prior one.
pub struct TimerService {
    config: TimerConfig,
    bus: ActionBusHandle,
    tokens: Mutex<HashMap<(SessionId, TimerName), CancellationToken>>,
}

impl TimerService {
    pub fn new(config: TimerConfig, bus: ActionBusHandle) -> Self {
        Self {
            config,
            bus,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) `name` for `session_id` using the configured
    /// duration for that timer name. A no-op if the timer is `Uncapped` and
    /// no explicit override is given.
    pub fn start_default(&self, session_id: SessionId, name: TimerName, on_expiry: Action) {
        match self.config.duration_for(name) {
            TimerDuration::Bounded(d) => self.start(session_id, name, d, on_expiry),
            TimerDuration::Uncapped => {
                tracing::debug!(?name, %session_id, "timer has no cap configured, not starting");
            }
        }
    }

    /// Start (or restart) `name` for `session_id` with an explicit duration,
    /// e.g. a per-session `recording` cap.
    pub fn start(&self, session_id: SessionId, name: TimerName, duration: std::time::Duration, on_expiry: Action) {
        let token = CancellationToken::new();
        {
            let mut tokens = self.tokens.lock().unwrap();
            if let Some(old) = tokens.insert((session_id, name), token.clone()) {
                old.cancel();
            }
        }

        let bus = self.bus.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    bus.dispatch(on_expiry);
                }
                _ = token.cancelled() => {
                    tracing::trace!(%session_id, ?name, "timer cancelled before expiry");
                }
            }
        });
    }

    /// Cancel `name` for `session_id` if it exists. Returns whether a timer
    /// was found.
    pub fn cancel(&self, session_id: SessionId, name: TimerName) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.remove(&(session_id, name)) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer held for `session_id`, e.g. on session destruction.
    pub fn cancel_all(&self, session_id: SessionId) {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|(sid, _), token| {
            if *sid == session_id {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn is_running(&self, session_id: SessionId, name: TimerName) -> bool {
        self.tokens.lock().unwrap().contains_key(&(session_id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asrhub_action::ActionBus;
    use std::time::Duration;

    fn handle() -> (ActionBusHandle, tokio::sync::mpsc::UnboundedReceiver<Action>) {
        let (bus, rx) = ActionBus::new();
        (bus.handle(), rx)
    }

    #[tokio::test]
    async fn start_dispatches_on_expiry() {
        let (handle, mut rx) = handle();
        let service = TimerService::new(TimerConfig::default(), handle);
        let session_id = SessionId::new();
        service.start(
            session_id,
            TimerName::Awake,
            Duration::from_millis(10),
            Action::Reset { session_id },
        );
        let action = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(action.session_id(), session_id);
    }

    #[tokio::test]
    async fn cancel_prevents_dispatch() {
        let (handle, mut rx) = handle();
        let service = TimerService::new(TimerConfig::default(), handle);
        let session_id = SessionId::new();
        service.start(
            session_id,
            TimerName::Awake,
            Duration::from_millis(50),
            Action::Reset { session_id },
        );
        assert!(service.cancel(session_id, TimerName::Awake));
        let result = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(result.is_err(), "expected no action to be dispatched");
    }

    #[tokio::test]
    async fn restarting_replaces_the_prior_timer() {
        let (handle, mut rx) = handle();
        let service = TimerService::new(TimerConfig::default(), handle);
        let session_id = SessionId::new();
        service.start(
            session_id,
            TimerName::Awake,
            Duration::from_millis(500),
            Action::Reset { session_id },
        );
        // Replace with a much shorter duration before the first fires.
        service.start(
            session_id,
            TimerName::Awake,
            Duration::from_millis(10),
            Action::Reset { session_id },
        );
        let action = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(action.session_id(), session_id);
        // The first (replaced) timer must not also fire.
        let second = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn cancel_all_stops_every_timer_for_session() {
        let (handle, mut rx) = handle();
        let service = TimerService::new(TimerConfig::default(), handle);
        let session_id = SessionId::new();
        service.start(session_id, TimerName::Awake, Duration::from_millis(30), Action::Reset { session_id });
        service.start(session_id, TimerName::SessionIdle, Duration::from_millis(30), Action::Reset { session_id });
        service.cancel_all(session_id);
        let result = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn start_default_skips_uncapped_timers() {
        let (handle, mut rx) = handle();
        let service = TimerService::new(TimerConfig::default(), handle);
        let session_id = SessionId::new();
        service.start_default(session_id, TimerName::Recording, Action::Reset { session_id });
        assert!(!service.is_running(session_id, TimerName::Recording));
        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err());
    }
}
