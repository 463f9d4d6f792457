//! Umbrella error surfaced by the store's effects. `asrhub-fsm` and
//! `asrhub-session` have no error type of their own: the transition table
//! lookup is total (`Option`, never `Result`) and the reducer never fails,
//! so there is nothing for this enum to wrap from either crate.

use asrhub_action::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("max_sessions exceeded")]
    MaxSessionsExceeded,
    #[error(transparent)]
    Audio(#[from] asrhub_audio::AudioError),
    #[error(transparent)]
    Lease(#[from] asrhub_pool::LeaseError),
    #[error(transparent)]
    Provider(#[from] asrhub_pool::ProviderError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
