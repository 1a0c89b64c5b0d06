use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::TimerSlot;
use super::event::{PressEnd, PressSource};
use super::poller::ReplyPoller;
use super::ring::RingFeedback;
use super::telemetry::event::{CallKind, RingStopReason, TelemetryEvent};
use super::telemetry::Telemetry;
use crate::audio::capture::{ActiveCapture, VoiceRecorder};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::outputs::ui::{CallControl, Ui};
use crate::services::api::{CallRequest, ServerApi};

pub type GestureId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Pressed,
    Recording,
}

/// One physical press, from press-start to press-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressGesture {
    pub id: GestureId,
    pub source: PressSource,
    pub started_at: Instant,
    pub phase: GesturePhase,
    /// At-most-one-send latch.
    pub sent_guard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureEffect {
    ArmHold { gesture: GestureId },
    CancelHold,
    StartCapture { gesture: GestureId },
    SendRing { gesture: GestureId },
    /// Stop capturing and send ring + voice.
    FinishRecording { gesture: GestureId },
}

/// Pure tap-vs-hold state machine. Timers and I/O live in [`GestureController`].
#[derive(Debug)]
pub struct GestureMachine {
    gesture: Option<PressGesture>,
    next_id: GestureId,
    enabled: bool,
    hold: Duration,
}

impl GestureMachine {
    pub fn new(hold: Duration) -> Self {
        Self {
            gesture: None,
            next_id: 1,
            enabled: true,
            hold,
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.gesture.as_ref().map(|g| g.phase).unwrap_or(GesturePhase::Idle)
    }

    pub fn gesture(&self) -> Option<&PressGesture> {
        self.gesture.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Ignored while disabled or while another press is in progress, so a
    /// touch press cannot be doubled by a translated mouse press.
    pub fn press_start(&mut self, source: PressSource, now: Instant) -> Vec<GestureEffect> {
        if !self.enabled || self.gesture.is_some() {
            return Vec::new();
        }
        let id = self.next_id;
        self.next_id += 1;
        self.gesture = Some(PressGesture {
            id,
            source,
            started_at: now,
            phase: GesturePhase::Pressed,
            sent_guard: false,
        });
        vec![GestureEffect::ArmHold { gesture: id }]
    }

    /// Every end kind terminates the press. Signals from a source other than
    /// the one that started the press are dropped.
    ///
    /// A press held for at least the hold threshold is a recording even when
    /// its hold timer has not fired yet.
    pub fn press_end(
        &mut self,
        source: PressSource,
        _kind: PressEnd,
        now: Instant,
    ) -> Vec<GestureEffect> {
        match self.gesture.as_ref() {
            Some(g) if g.source == source => {}
            _ => return Vec::new(),
        }
        let Some(mut gesture) = self.gesture.take() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if gesture.phase == GesturePhase::Pressed {
            effects.push(GestureEffect::CancelHold);
        }
        if gesture.sent_guard {
            return effects;
        }
        gesture.sent_guard = true;
        self.enabled = false;

        let held = now.saturating_duration_since(gesture.started_at);
        if gesture.phase == GesturePhase::Pressed && held >= self.hold {
            gesture.phase = GesturePhase::Recording;
            effects.push(GestureEffect::StartCapture { gesture: gesture.id });
        }

        let id = gesture.id;
        match gesture.phase {
            GesturePhase::Pressed => effects.push(GestureEffect::SendRing { gesture: id }),
            GesturePhase::Recording => effects.push(GestureEffect::FinishRecording { gesture: id }),
            GesturePhase::Idle => {}
        }
        effects
    }

    pub fn hold_elapsed(&mut self, id: GestureId) -> Vec<GestureEffect> {
        match self.gesture.as_mut() {
            Some(g) if g.id == id && g.phase == GesturePhase::Pressed => {
                g.phase = GesturePhase::Recording;
                vec![GestureEffect::StartCapture { gesture: id }]
            }
            _ => Vec::new(),
        }
    }

    /// Drops the press if it is still recording. Returns `true` when the
    /// failure belongs to the live press.
    pub fn capture_failed(&mut self, id: GestureId) -> bool {
        let live = self
            .gesture
            .as_ref()
            .is_some_and(|g| g.id == id && g.phase == GesturePhase::Recording);
        if live {
            self.gesture = None;
        }
        live
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GestureSettings {
    pub hold: Duration,
    pub hold_progress: Duration,
    pub cooldown: Duration,
}

impl From<&ClientConfig> for GestureSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            hold: config.hold(),
            hold_progress: config.hold_progress(),
            cooldown: config.cooldown(),
        }
    }
}

type PendingCapture<C> = (GestureId, JoinHandle<Result<C, ClientError>>);

struct ControllerInner<C> {
    machine: GestureMachine,
    hold_timer: TimerSlot,
    cooldown_timer: TimerSlot,
    pending_capture: Option<PendingCapture<C>>,
}

/// Owns the call control: tap rings, hold records and rings with voice.
pub struct GestureController<S: ServerApi, R: VoiceRecorder> {
    inner: Arc<Mutex<ControllerInner<R::Capture>>>,
    api: Arc<S>,
    recorder: Arc<R>,
    ring: RingFeedback,
    poller: ReplyPoller<S>,
    ui: Arc<dyn Ui>,
    telemetry: Telemetry,
    settings: GestureSettings,
}

impl<S: ServerApi, R: VoiceRecorder> Clone for GestureController<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            api: self.api.clone(),
            recorder: self.recorder.clone(),
            ring: self.ring.clone(),
            poller: self.poller.clone(),
            ui: self.ui.clone(),
            telemetry: self.telemetry.clone(),
            settings: self.settings,
        }
    }
}

impl<S: ServerApi, R: VoiceRecorder> GestureController<S, R> {
    pub fn new(
        api: Arc<S>,
        recorder: Arc<R>,
        ring: RingFeedback,
        poller: ReplyPoller<S>,
        ui: Arc<dyn Ui>,
        telemetry: Telemetry,
        settings: GestureSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControllerInner {
                machine: GestureMachine::new(settings.hold),
                hold_timer: TimerSlot::new(),
                cooldown_timer: TimerSlot::new(),
                pending_capture: None,
            })),
            api,
            recorder,
            ring,
            poller,
            ui,
            telemetry,
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner<R::Capture>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> GesturePhase {
        self.lock().machine.phase()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().machine.is_enabled()
    }

    pub fn is_holding(&self) -> bool {
        self.lock().hold_timer.is_armed()
    }

    pub fn press_start(&self, source: PressSource) {
        let mut inner = self.lock();
        let effects = inner.machine.press_start(source, Instant::now());
        if effects.is_empty() {
            debug!("press start from {source:?} ignored");
        }
        self.apply(&mut inner, effects);
    }

    pub fn press_end(&self, source: PressSource, kind: PressEnd) {
        let mut inner = self.lock();
        let effects = inner.machine.press_end(source, kind, Instant::now());
        self.apply(&mut inner, effects);
    }

    /// Explicit hang-up: stops ringing and abandons the wait for a reply.
    pub fn cancel_call(&self) {
        self.ring.stop(RingStopReason::Cancelled);
        if self.poller.cancel() {
            self.ui.set_status("Call cancelled.");
        }
    }

    fn apply(&self, inner: &mut ControllerInner<R::Capture>, effects: Vec<GestureEffect>) {
        for effect in effects {
            match effect {
                GestureEffect::ArmHold { gesture } => {
                    let this = self.clone();
                    inner.hold_timer.arm(move |token| this.run_hold(gesture, token));
                }
                GestureEffect::CancelHold => {
                    inner.hold_timer.cancel();
                    self.ui.set_hold_progress(0.0);
                }
                GestureEffect::StartCapture { gesture } => {
                    info!("gesture {gesture}: hold threshold reached, recording");
                    self.ui.set_hold_progress(1.0);
                    self.ui.set_status("Recording... release to send");
                    let recorder = self.recorder.clone();
                    let this = self.clone();
                    let handle = tokio::spawn(async move {
                        let result = recorder.begin().await;
                        match &result {
                            Ok(_) => this.telemetry.record(TelemetryEvent::RecordingStarted),
                            Err(e) => this.on_capture_failed(gesture, e),
                        }
                        result
                    });
                    inner.pending_capture = Some((gesture, handle));
                }
                GestureEffect::SendRing { gesture } => {
                    debug!("gesture {gesture}: tap, sending ring");
                    self.ui.set_call_control(CallControl::Calling);
                    tokio::spawn(self.clone().dispatch(CallRequest::Ring));
                }
                GestureEffect::FinishRecording { gesture } => {
                    self.ui.set_hold_progress(0.0);
                    self.ui.set_call_control(CallControl::Calling);
                    let pending = match inner.pending_capture.take() {
                        Some((id, handle)) if id == gesture => Some(handle),
                        _ => None,
                    };
                    tokio::spawn(self.clone().finish_recording(gesture, pending));
                }
            }
        }
    }

    async fn run_hold(self, gesture: GestureId, token: CancellationToken) {
        let started = Instant::now();
        let deadline = started + self.settings.hold;
        let mut progress = tokio::time::interval(self.settings.hold_progress);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => break,
                _ = progress.tick() => {
                    let hold = self.settings.hold.as_secs_f32();
                    let fraction = started.elapsed().as_secs_f32() / hold;
                    self.ui.set_hold_progress(fraction.min(1.0));
                }
            }
        }

        let mut inner = self.lock();
        inner.hold_timer.release();
        let effects = inner.machine.hold_elapsed(gesture);
        self.apply(&mut inner, effects);
    }

    fn on_capture_failed(&self, gesture: GestureId, error: &ClientError) {
        let mut inner = self.lock();
        if !inner.machine.capture_failed(gesture) {
            // Already released; the send path reports it.
            return;
        }
        if inner.pending_capture.as_ref().is_some_and(|(id, _)| *id == gesture) {
            inner.pending_capture = None;
        }
        drop(inner);
        self.report_capture_failure(error);
    }

    fn report_capture_failure(&self, error: &ClientError) {
        warn!("recording aborted: {error}");
        self.telemetry.record(TelemetryEvent::CaptureDenied);
        self.ui.set_hold_progress(0.0);
        self.ui.set_status(&format!("Could not record: {error}"));
    }

    async fn finish_recording(
        self,
        gesture: GestureId,
        pending: Option<JoinHandle<Result<R::Capture, ClientError>>>,
    ) {
        let capture = match pending {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(ClientError::CaptureDenied(e.to_string())),
            },
            None => Err(ClientError::CaptureDenied("recording never started".into())),
        };

        let clip = match capture {
            Ok(capture) => capture.finish().await,
            Err(e) => Err(e),
        };

        match clip.and_then(|clip| clip.encode()) {
            Ok(clip) => {
                debug!("gesture {gesture}: {} ms of voice captured", clip.duration_ms());
                self.dispatch(CallRequest::RingWithVoice(clip)).await;
            }
            Err(e) => {
                self.report_capture_failure(&e);
                self.lock().machine.enable();
                self.ui.set_call_control(CallControl::Ready);
            }
        }
    }

    async fn dispatch(self, call: CallRequest) {
        let kind = match call {
            CallRequest::Ring => CallKind::Ring,
            CallRequest::RingWithVoice(_) => CallKind::RingWithVoice,
        };

        self.ui.set_status("Sending call...");
        self.ring.start();

        match self.api.post_call(call).await {
            Ok(ack) => {
                info!("Call result: {:?}", ack.body);
                self.telemetry.record(TelemetryEvent::CallSent { kind });
                self.ring.stop(RingStopReason::SendAcknowledged);
                self.ui.set_call_control(CallControl::Sent);
                self.ui.set_status("Call Sent! Waiting for reply...");
                self.poller.start();
            }
            Err(e) => {
                warn!("call failed: {e}");
                self.telemetry.record(TelemetryEvent::CallFailed { kind });
                self.ring.stop(RingStopReason::SendFailed);
                self.poller.cancel();
                self.ui.set_call_control(CallControl::Disabled);
                self.ui.set_status(&format!("Error sending call: {e}"));
            }
        }

        self.arm_cooldown();
    }

    fn arm_cooldown(&self) {
        let this = self.clone();
        let cooldown = self.settings.cooldown;
        self.lock().cooldown_timer.arm(move |token| async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(cooldown) => {
                    let mut inner = this.lock();
                    inner.cooldown_timer.release();
                    inner.machine.enable();
                    drop(inner);
                    this.ui.set_call_control(CallControl::Ready);
                }
            }
        });
    }
}
