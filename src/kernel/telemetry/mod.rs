//! Call-flow telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (gesture, ring, poller, agent).
//! It exists solely for observability and verification.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain user content (reply text, audio, subscription keys).
//! Only session ids, enums and counts are allowed.

pub mod event;
pub mod metrics;
pub mod recorder;

use std::sync::{Arc, Mutex, PoisonError};

use event::TelemetryEvent;
use metrics::TelemetrySnapshot;
use recorder::TelemetryRecorder;

/// Cloneable handle shared by every component of one context.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    recorder: Arc<Mutex<TelemetryRecorder>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TelemetryEvent) {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events()
    }
}
