//! The typed action/event vocabulary shared by every control-plane crate.

mod action;
mod bus;
mod types;

pub use action::{
    Action, AudioMetadataPayload, BackpressurePayload, EndRecordingPayload, ErrorPayload,
    RejectedPayload, StartListeningPayload, StateChangedPayload, TranscriptionDonePayload,
    UploadFilePayload, WakeTriggeredPayload,
};
pub use bus::{
    ActionBus, ActionBusHandle, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus,
    Middleware, NullEventBus, SessionEvent,
};
pub use types::{
    EndTrigger, ErrorInfo, ErrorKind, EventKind, FsmState, SessionId, Strategy, Transcript,
    TranscriptSegment, TimerName, WakeSource, Word,
};
