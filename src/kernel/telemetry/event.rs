use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Allowed: IDs, Counts, Enums
// Forbidden: reply text, audio samples, subscription descriptors

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    CallSent {
        kind: CallKind,
    },
    CallFailed {
        kind: CallKind,
    },

    RecordingStarted,
    CaptureDenied,

    RingStarted {
        session: Uuid,
    },
    RingStopped {
        session: Uuid,
        reason: RingStopReason,
    },

    PollStarted {
        session: Uuid,
    },
    PollError {
        session: Uuid,
        attempt: u32,
    },
    DuplicateSuppressed {
        session: Uuid,
    },
    PollTimedOut {
        session: Uuid,
        attempts: u32,
    },
    PollCancelled {
        session: Uuid,
    },

    ReplyAnnounced {
        channel: AnnounceChannel,
    },

    Subscription(SubscriptionEvent),

    PushShown,
    PushActionRelayed {
        delivered: bool,
    },
    WindowFocused {
        navigated: bool,
    },
    WindowOpened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Ring,
    RingWithVoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingStopReason {
    SendAcknowledged,
    SendFailed,
    ReplyArrived,
    SafetyTimeout,
    Cancelled,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnounceChannel {
    Clip,
    Speech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionEvent {
    Unsupported,
    AgentRegistered,
    Confirmed,
    Denied,
    Failed,
}
