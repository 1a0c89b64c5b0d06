use std::collections::VecDeque;
use super::event::{AnnounceChannel, CallKind, RingStopReason, SubscriptionEvent, TelemetryEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub call_stats: CallStats,
    pub ring_stats: RingStats,
    pub poll_stats: PollStats,
    pub announce_stats: AnnounceStats,
    pub subscription_stats: SubscriptionStats,
    pub agent_stats: AgentStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    pub rings_sent: u64,
    pub voice_calls_sent: u64,
    pub failures: u64,
    pub recordings_started: u64,
    pub capture_denied: u64,
}

impl CallStats {
    pub fn total_sent(&self) -> u64 {
        self.rings_sent + self.voice_calls_sent
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingStats {
    pub started: u64,
    pub stopped: u64,
    pub safety_timeouts: u64,
    pub stopped_by_reply: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub sessions: u64,
    pub errors: u64,
    pub duplicates_suppressed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceStats {
    pub clips: u64,
    pub speech: u64,
}

impl AnnounceStats {
    pub fn total(&self) -> u64 {
        self.clips + self.speech
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub confirmed: u64,
    pub denied: u64,
    pub failed: u64,
    pub unsupported: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub notifications_shown: u64,
    pub replies_relayed: u64,
    pub relay_failures: u64,
    pub windows_focused: u64,
    pub windows_opened: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::CallSent { kind } => match kind {
                CallKind::Ring => snap.call_stats.rings_sent += 1,
                CallKind::RingWithVoice => snap.call_stats.voice_calls_sent += 1,
            },
            TelemetryEvent::CallFailed { .. } => snap.call_stats.failures += 1,
            TelemetryEvent::RecordingStarted => snap.call_stats.recordings_started += 1,
            TelemetryEvent::CaptureDenied => snap.call_stats.capture_denied += 1,

            TelemetryEvent::RingStarted { .. } => snap.ring_stats.started += 1,
            TelemetryEvent::RingStopped { reason, .. } => {
                snap.ring_stats.stopped += 1;
                match reason {
                    RingStopReason::SafetyTimeout => snap.ring_stats.safety_timeouts += 1,
                    RingStopReason::ReplyArrived => snap.ring_stats.stopped_by_reply += 1,
                    _ => {}
                }
            }

            TelemetryEvent::PollStarted { .. } => snap.poll_stats.sessions += 1,
            TelemetryEvent::PollError { .. } => snap.poll_stats.errors += 1,
            TelemetryEvent::DuplicateSuppressed { .. } => {
                snap.poll_stats.duplicates_suppressed += 1
            }
            TelemetryEvent::PollTimedOut { .. } => snap.poll_stats.timeouts += 1,
            TelemetryEvent::PollCancelled { .. } => snap.poll_stats.cancelled += 1,

            TelemetryEvent::ReplyAnnounced { channel } => match channel {
                AnnounceChannel::Clip => snap.announce_stats.clips += 1,
                AnnounceChannel::Speech => snap.announce_stats.speech += 1,
            },

            TelemetryEvent::Subscription(kind) => match kind {
                SubscriptionEvent::Confirmed => snap.subscription_stats.confirmed += 1,
                SubscriptionEvent::Denied => snap.subscription_stats.denied += 1,
                SubscriptionEvent::Failed => snap.subscription_stats.failed += 1,
                SubscriptionEvent::Unsupported => snap.subscription_stats.unsupported += 1,
                SubscriptionEvent::AgentRegistered => {}
            },

            TelemetryEvent::PushShown => snap.agent_stats.notifications_shown += 1,
            TelemetryEvent::PushActionRelayed { delivered } => {
                if *delivered {
                    snap.agent_stats.replies_relayed += 1;
                } else {
                    snap.agent_stats.relay_failures += 1;
                }
            }
            TelemetryEvent::WindowFocused { .. } => snap.agent_stats.windows_focused += 1,
            TelemetryEvent::WindowOpened => snap.agent_stats.windows_opened += 1,
        }
    }

    snap
}
