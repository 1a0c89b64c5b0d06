#![allow(dead_code)]

use reqwest::Url;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use ringback::agent::payload::{Notification, NotificationId};
use ringback::agent::worker::{NotificationCenter, WindowClient, WindowClients};
use ringback::audio::capture::{ActiveCapture, VoiceRecorder};
use ringback::audio::chime::TonePlayer;
use ringback::audio::clip::VoiceClip;
use ringback::error::{ClientError, Result};
use ringback::kernel::event::{CallAck, ReplyRecord, SubscribeAck};
use ringback::kernel::gesture::{GestureController, GestureSettings};
use ringback::kernel::poller::ReplyPoller;
use ringback::kernel::reply::{PhraseClip, ReplyHandler};
use ringback::kernel::ring::RingFeedback;
use ringback::kernel::subscription::{PushPlatform, SubscriptionDescriptor};
use ringback::kernel::telemetry::Telemetry;
use ringback::outputs::ui::{Announcer, CallControl, EnableControl, Ui};
use ringback::services::api::{CallRequest, ServerApi};

pub const HOLD: Duration = Duration::from_millis(400);
pub const COOLDOWN: Duration = Duration::from_millis(5000);
pub const RING_PERIOD: Duration = Duration::from_millis(1500);
pub const RING_SAFETY: Duration = Duration::from_millis(30_000);
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const MAX_ATTEMPTS: u32 = 5;

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Lets spawned tasks run to their next timer.
pub async fn settle() {
    tokio::time::sleep(ms(1)).await;
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

// --- Ui ---

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    CallControl(CallControl),
    EnableControl(EnableControl),
    Status(String),
    Ringing(bool),
    Reply(String),
    PlayControl(String),
}

#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    hold_progress: Mutex<Vec<f32>>,
}

impl RecordingUi {
    pub fn events(&self) -> Vec<UiEvent> {
        lock(&self.events).clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses().pop()
    }

    pub fn last_call_control(&self) -> Option<CallControl> {
        self.events().into_iter().rev().find_map(|e| match e {
            UiEvent::CallControl(c) => Some(c),
            _ => None,
        })
    }

    pub fn last_enable_control(&self) -> Option<EnableControl> {
        self.events().into_iter().rev().find_map(|e| match e {
            UiEvent::EnableControl(c) => Some(c),
            _ => None,
        })
    }

    pub fn ringing(&self) -> Option<bool> {
        self.events().into_iter().rev().find_map(|e| match e {
            UiEvent::Ringing(on) => Some(on),
            _ => None,
        })
    }

    pub fn play_controls(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::PlayControl(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn hold_progress(&self) -> Vec<f32> {
        lock(&self.hold_progress).clone()
    }
}

impl Ui for RecordingUi {
    fn set_call_control(&self, state: CallControl) {
        lock(&self.events).push(UiEvent::CallControl(state));
    }
    fn set_enable_control(&self, state: EnableControl) {
        lock(&self.events).push(UiEvent::EnableControl(state));
    }
    fn set_status(&self, text: &str) {
        lock(&self.events).push(UiEvent::Status(text.to_string()));
    }
    fn set_ringing(&self, on: bool) {
        lock(&self.events).push(UiEvent::Ringing(on));
    }
    fn set_hold_progress(&self, fraction: f32) {
        lock(&self.hold_progress).push(fraction);
    }
    fn show_reply(&self, text: &str) {
        lock(&self.events).push(UiEvent::Reply(text.to_string()));
    }
    fn show_play_control(&self, clip_url: &str) {
        lock(&self.events).push(UiEvent::PlayControl(clip_url.to_string()));
    }
}

// --- Announcer ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announced {
    Clip(String),
    Speech(String),
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    announced: Mutex<Vec<Announced>>,
    /// Simulates blocked autoplay / missing player.
    pub fail_clips: AtomicBool,
}

impl RecordingAnnouncer {
    pub fn announced(&self) -> Vec<Announced> {
        lock(&self.announced).clone()
    }

    pub fn clips(&self) -> Vec<String> {
        self.announced()
            .into_iter()
            .filter_map(|a| match a {
                Announced::Clip(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn speech(&self) -> Vec<String> {
        self.announced()
            .into_iter()
            .filter_map(|a| match a {
                Announced::Speech(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl Announcer for RecordingAnnouncer {
    fn play_clip(&self, url: &str) -> anyhow::Result<()> {
        lock(&self.announced).push(Announced::Clip(url.to_string()));
        if self.fail_clips.load(Ordering::SeqCst) {
            anyhow::bail!("autoplay blocked");
        }
        Ok(())
    }

    fn speak(&self, text: &str) -> anyhow::Result<()> {
        lock(&self.announced).push(Announced::Speech(text.to_string()));
        Ok(())
    }
}

// --- Tone ---

#[derive(Default)]
pub struct SilentTone {
    plays: AtomicUsize,
    pub fail: AtomicBool,
}

impl SilentTone {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl TonePlayer for SilentTone {
    fn play(&self) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("audio context suspended");
        }
        Ok(())
    }
}

// --- Server ---

#[derive(Default)]
pub struct MockServer {
    calls: Mutex<Vec<CallRequest>>,
    pub fail_calls: AtomicBool,
    poll_script: Mutex<VecDeque<Result<ReplyRecord>>>,
    polls: AtomicUsize,
    subscriptions: Mutex<Vec<SubscriptionDescriptor>>,
    subscribe_status: Mutex<Option<String>>,
    replies: Mutex<Vec<String>>,
    pub fail_replies: AtomicBool,
}

impl MockServer {
    pub fn new() -> Self {
        let server = Self::default();
        *lock(&server.subscribe_status) = Some("success".into());
        server
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        lock(&self.calls).clone()
    }

    /// Queued poll responses; an empty queue answers "no reply yet".
    pub fn script_polls(&self, responses: impl IntoIterator<Item = Result<ReplyRecord>>) {
        lock(&self.poll_script).extend(responses);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionDescriptor> {
        lock(&self.subscriptions).clone()
    }

    pub fn set_subscribe_status(&self, status: &str) {
        *lock(&self.subscribe_status) = Some(status.to_string());
    }

    pub fn replies(&self) -> Vec<String> {
        lock(&self.replies).clone()
    }
}

impl ServerApi for MockServer {
    async fn post_call(&self, call: CallRequest) -> Result<CallAck> {
        if self.fail_calls.load(Ordering::SeqCst) {
            return Err(ClientError::Network("server error: 500 Internal Server Error".into()));
        }
        lock(&self.calls).push(call);
        Ok(serde_json::from_value(serde_json::json!({ "status": "Call sent" }))
            .map_err(|e| ClientError::Network(e.to_string()))?)
    }

    async fn subscribe(&self, subscription: &SubscriptionDescriptor) -> Result<SubscribeAck> {
        lock(&self.subscriptions).push(subscription.clone());
        Ok(SubscribeAck {
            status: lock(&self.subscribe_status).clone(),
        })
    }

    async fn poll_reply(&self) -> Result<ReplyRecord> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        lock(&self.poll_script)
            .pop_front()
            .unwrap_or_else(|| Ok(ReplyRecord::empty()))
    }

    async fn post_reply(&self, minutes: &str) -> Result<()> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        lock(&self.replies).push(minutes.to_string());
        Ok(())
    }
}

// --- Microphone ---

pub const FAKE_RATE: u32 = 16_000;

/// Produces a clip whose length equals the time between `begin` and `finish`.
pub struct FakeRecorder {
    deny: bool,
    begin_delay: Duration,
    rate: u32,
    begins: AtomicUsize,
}

impl FakeRecorder {
    pub fn allowing() -> Self {
        Self {
            deny: false,
            begin_delay: Duration::ZERO,
            rate: FAKE_RATE,
            begins: AtomicUsize::new(0),
        }
    }

    /// Records fine but hands back a clip that cannot be encoded.
    pub fn unencodable() -> Self {
        Self {
            rate: 0,
            ..Self::allowing()
        }
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::allowing()
        }
    }

    /// Permission prompt that takes `delay` before refusing.
    pub fn denying_after(delay: Duration) -> Self {
        Self {
            deny: true,
            begin_delay: delay,
            ..Self::allowing()
        }
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

pub struct FakeCapture {
    started: Instant,
    rate: u32,
}

impl VoiceRecorder for FakeRecorder {
    type Capture = FakeCapture;

    async fn begin(&self) -> Result<FakeCapture> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if !self.begin_delay.is_zero() {
            tokio::time::sleep(self.begin_delay).await;
        }
        if self.deny {
            return Err(ClientError::CaptureDenied("permission denied".into()));
        }
        Ok(FakeCapture {
            started: Instant::now(),
            rate: self.rate,
        })
    }
}

impl ActiveCapture for FakeCapture {
    async fn finish(self) -> Result<VoiceClip> {
        let elapsed = self.started.elapsed().as_millis() as usize;
        Ok(VoiceClip::new(self.rate, vec![0.1; elapsed * FAKE_RATE as usize / 1000]))
    }
}

// --- Push platform ---

pub struct FakePushPlatform {
    pub supported: bool,
    pub register_fails: AtomicBool,
    registrations: AtomicUsize,
    existing: Mutex<Option<SubscriptionDescriptor>>,
    outcome: Mutex<Result<SubscriptionDescriptor>>,
    keys: Mutex<Vec<Vec<u8>>>,
}

impl FakePushPlatform {
    pub fn granting() -> Self {
        Self {
            supported: true,
            register_fails: AtomicBool::new(false),
            registrations: AtomicUsize::new(0),
            existing: Mutex::new(None),
            outcome: Mutex::new(Ok(descriptor("https://push.example/sub/1"))),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::granting()
        }
    }

    pub fn denying() -> Self {
        let platform = Self::granting();
        *lock(&platform.outcome) = Err(ClientError::PermissionDenied);
        platform
    }

    pub fn already_subscribed() -> Self {
        let platform = Self::granting();
        *lock(&platform.existing) = Some(descriptor("https://push.example/sub/0"));
        platform
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        lock(&self.keys).clone()
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

pub fn descriptor(endpoint: &str) -> SubscriptionDescriptor {
    SubscriptionDescriptor::new(serde_json::json!({
        "endpoint": endpoint,
        "keys": { "p256dh": "BNc", "auth": "tBH" }
    }))
}

impl PushPlatform for FakePushPlatform {
    fn supports_push(&self) -> bool {
        self.supported
    }

    async fn register_agent(&self) -> Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.register_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Network("agent script missing".into()));
        }
        Ok(())
    }

    async fn existing_subscription(&self) -> Result<Option<SubscriptionDescriptor>> {
        Ok(lock(&self.existing).clone())
    }

    async fn subscribe(&self, server_key: &[u8]) -> Result<SubscriptionDescriptor> {
        lock(&self.keys).push(server_key.to_vec());
        lock(&self.outcome).clone()
    }
}

// --- Notifications & windows ---

#[derive(Default)]
pub struct FakeNotifications {
    shown: Mutex<Vec<Notification>>,
    closed: Mutex<Vec<NotificationId>>,
}

impl FakeNotifications {
    pub fn shown(&self) -> Vec<Notification> {
        lock(&self.shown).clone()
    }

    pub fn closed(&self) -> Vec<NotificationId> {
        lock(&self.closed).clone()
    }
}

impl NotificationCenter for FakeNotifications {
    async fn show(&self, notification: &Notification) -> Result<()> {
        lock(&self.shown).push(notification.clone());
        Ok(())
    }

    fn close(&self, id: NotificationId) {
        lock(&self.closed).push(id);
    }
}

#[derive(Default)]
pub struct FakeWindows {
    clients: Mutex<Vec<WindowClient>>,
    focused: Mutex<Vec<u64>>,
    navigated: Mutex<Vec<(u64, Url)>>,
    opened: Mutex<Vec<Url>>,
}

impl FakeWindows {
    pub fn with_pages(urls: &[&str]) -> Self {
        let windows = Self::default();
        *lock(&windows.clients) = urls
            .iter()
            .enumerate()
            .map(|(i, url)| WindowClient {
                id: i as u64 + 1,
                url: Url::parse(url).unwrap(),
            })
            .collect();
        windows
    }

    pub fn focused(&self) -> Vec<u64> {
        lock(&self.focused).clone()
    }

    pub fn navigated(&self) -> Vec<(u64, Url)> {
        lock(&self.navigated).clone()
    }

    pub fn opened(&self) -> Vec<Url> {
        lock(&self.opened).clone()
    }
}

impl WindowClients for FakeWindows {
    async fn list(&self) -> Vec<WindowClient> {
        lock(&self.clients).clone()
    }

    async fn focus(&self, client: &WindowClient) -> Result<()> {
        lock(&self.focused).push(client.id);
        Ok(())
    }

    async fn navigate(&self, client: &WindowClient, url: &Url) -> Result<()> {
        lock(&self.navigated).push((client.id, url.clone()));
        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<()> {
        lock(&self.opened).push(url.clone());
        Ok(())
    }
}

// --- Page client assembly ---

pub struct Page {
    pub api: Arc<MockServer>,
    pub ui: Arc<RecordingUi>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub tone: Arc<SilentTone>,
    pub recorder: Arc<FakeRecorder>,
    pub ring: RingFeedback,
    pub poller: ReplyPoller<MockServer>,
    pub gestures: GestureController<MockServer, FakeRecorder>,
    pub telemetry: Telemetry,
}

impl Page {
    pub fn new(recorder: FakeRecorder) -> Self {
        let api = Arc::new(MockServer::new());
        let ui = Arc::new(RecordingUi::default());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let tone = Arc::new(SilentTone::default());
        let recorder = Arc::new(recorder);
        let telemetry = Telemetry::new();

        let ring = RingFeedback::new(
            tone.clone(),
            ui.clone(),
            telemetry.clone(),
            RING_PERIOD,
            RING_SAFETY,
        );
        let handler = ReplyHandler::new(
            ring.clone(),
            ui.clone(),
            announcer.clone(),
            PhraseClip::default_table(),
            telemetry.clone(),
        );
        let poller = ReplyPoller::new(
            api.clone(),
            handler,
            ui.clone(),
            telemetry.clone(),
            POLL_INTERVAL,
            MAX_ATTEMPTS,
        );
        let gestures = GestureController::new(
            api.clone(),
            recorder.clone(),
            ring.clone(),
            poller.clone(),
            ui.clone(),
            telemetry.clone(),
            GestureSettings {
                hold: HOLD,
                hold_progress: ms(50),
                cooldown: COOLDOWN,
            },
        );

        Self {
            api,
            ui,
            announcer,
            tone,
            recorder,
            ring,
            poller,
            gestures,
            telemetry,
        }
    }
}
