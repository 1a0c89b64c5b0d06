use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::cancel::TimerSlot;
use super::telemetry::event::{RingStopReason, TelemetryEvent};
use super::telemetry::Telemetry;
use crate::audio::chime::TonePlayer;
use crate::outputs::ui::Ui;

/// One active ringing episode. Dropping it cancels its timer.
#[derive(Debug)]
pub struct RingSession {
    pub id: Uuid,
    pub safety_deadline: Instant,
    tone: TimerSlot,
}

#[derive(Debug, Default)]
struct RingInner {
    session: Option<RingSession>,
}

/// Looping chime + ringing visual with a hard safety deadline.
///
/// `stop` is idempotent and commutative: whichever caller gets there first
/// tears the session down, every later call is a no-op.
#[derive(Clone)]
pub struct RingFeedback {
    inner: Arc<Mutex<RingInner>>,
    tone: Arc<dyn TonePlayer>,
    ui: Arc<dyn Ui>,
    telemetry: Telemetry,
    period: Duration,
    safety: Duration,
}

impl RingFeedback {
    pub fn new(
        tone: Arc<dyn TonePlayer>,
        ui: Arc<dyn Ui>,
        telemetry: Telemetry,
        period: Duration,
        safety: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingInner::default())),
            tone,
            ui,
            telemetry,
            period,
            safety,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tears down any existing session, then starts a new one.
    ///
    /// The session and the ringing visual always change under the same lock.
    pub fn start(&self) -> Uuid {
        let id = Uuid::new_v4();
        let safety_deadline = Instant::now() + self.safety;

        let mut inner = self.lock();
        if let Some(previous) = inner.session.take() {
            self.teardown(previous, RingStopReason::Replaced, false);
        }

        let mut tone = TimerSlot::new();
        let ring = self.clone();
        tone.arm(move |token| ring.run_session(id, safety_deadline, token));
        inner.session = Some(RingSession { id, safety_deadline, tone });

        self.ui.set_ringing(true);
        self.telemetry.record(TelemetryEvent::RingStarted { session: id });
        drop(inner);

        info!("ring {id} started");
        id
    }

    /// Returns `true` if this call stopped an active session.
    pub fn stop(&self, reason: RingStopReason) -> bool {
        let mut inner = self.lock();
        match inner.session.take() {
            Some(session) => {
                self.teardown(session, reason, false);
                true
            }
            None => false,
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn current_session(&self) -> Option<Uuid> {
        self.lock().session.as_ref().map(|s| s.id)
    }

    pub fn safety_deadline(&self) -> Option<Instant> {
        self.lock().session.as_ref().map(|s| s.safety_deadline)
    }

    async fn run_session(self, id: Uuid, deadline: Instant, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let safety = tokio::time::sleep_until(deadline);
        tokio::pin!(safety);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = &mut safety => {
                    self.expire(id);
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tone.play() {
                        debug!("ring tone unavailable: {e}");
                    }
                }
            }
        }
    }

    /// Safety deadline path. Runs inside the session's own task, so the
    /// timer is released rather than aborted.
    fn expire(&self, id: Uuid) {
        let mut inner = self.lock();
        if inner.session.as_ref().is_some_and(|s| s.id == id) {
            if let Some(session) = inner.session.take() {
                self.teardown(session, RingStopReason::SafetyTimeout, true);
            }
        }
    }

    /// Called with the session lock held.
    fn teardown(&self, mut session: RingSession, reason: RingStopReason, from_own_task: bool) {
        if from_own_task {
            session.tone.release();
        } else {
            session.tone.cancel();
        }
        if reason != RingStopReason::Replaced {
            self.ui.set_ringing(false);
        }
        self.telemetry.record(TelemetryEvent::RingStopped {
            session: session.id,
            reason,
        });
        info!("ring {} stopped: {:?}", session.id, reason);
    }
}
