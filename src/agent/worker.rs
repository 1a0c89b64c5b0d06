use reqwest::Url;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::payload::{Notification, NotificationId, NotificationPayload};
use crate::error::Result;
use crate::kernel::telemetry::event::TelemetryEvent;
use crate::kernel::telemetry::Telemetry;
use crate::services::api::ServerApi;

/// Query parameter that asks a page to autoplay a clip on load.
pub const PLAY_PARAM: &str = "play";

/// System notification surface.
pub trait NotificationCenter: Send + Sync + 'static {
    fn show(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;
    fn close(&self, id: NotificationId);
}

/// An open page the agent can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: u64,
    pub url: Url,
}

/// Open page clients.
pub trait WindowClients: Send + Sync + 'static {
    fn list(&self) -> impl Future<Output = Vec<WindowClient>> + Send;
    fn focus(&self, client: &WindowClient) -> impl Future<Output = Result<()>> + Send;
    fn navigate(&self, client: &WindowClient, url: &Url) -> impl Future<Output = Result<()>> + Send;
    fn open(&self, url: &Url) -> impl Future<Output = Result<()>> + Send;
}

/// A notification the user interacted with. `action` is `None` for a click
/// on the notification body.
#[derive(Debug, Clone)]
pub struct NotificationClick {
    pub notification: Notification,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Focused { navigated: bool },
    Opened,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    /// `None` when there was no reply to relay.
    pub relayed: Option<bool>,
    pub window: WindowOutcome,
}

/// Autoplay target for `audio_url`, or the bare scope root.
pub fn target_url(scope: &Url, audio_url: Option<&str>) -> Url {
    let mut target = scope.clone();
    target.set_query(None);
    if let Some(audio) = audio_url {
        target.query_pairs_mut().append_pair(PLAY_PARAM, audio);
    }
    target
}

pub fn in_scope(scope: &Url, url: &Url) -> bool {
    url.as_str().starts_with(scope.as_str())
}

/// Background agent: turns push messages into notifications and clicks into
/// reply relays and page focus. Holds no page state.
pub struct PushAgent<S: ServerApi, N: NotificationCenter, W: WindowClients> {
    api: Arc<S>,
    notifications: Arc<N>,
    windows: Arc<W>,
    scope: Url,
    telemetry: Telemetry,
    next_id: AtomicU64,
}

impl<S: ServerApi, N: NotificationCenter, W: WindowClients> PushAgent<S, N, W> {
    pub fn new(
        api: Arc<S>,
        notifications: Arc<N>,
        windows: Arc<W>,
        scope: Url,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            api,
            notifications,
            windows,
            scope,
            telemetry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub async fn on_push(&self, raw: &[u8]) -> Result<Notification> {
        let payload = NotificationPayload::parse(raw)?;
        info!(
            "push received: {} action(s), audio: {}",
            payload.actions.len(),
            payload.audio_url.is_some()
        );

        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification::from_payload(id, payload, now_ms());
        self.notifications.show(&notification).await?;
        self.telemetry.record(TelemetryEvent::PushShown);
        Ok(notification)
    }

    /// Reply relay and focus run concurrently; a failed relay does not keep
    /// the page from being focused or opened.
    pub async fn on_notification_click(&self, click: NotificationClick) -> ClickOutcome {
        self.notifications.close(click.notification.id);
        let audio_url = click.notification.data.audio_url.as_deref();
        let target = target_url(&self.scope, audio_url);

        let relay = async {
            match click.action.as_deref() {
                Some(choice) => Some(self.relay_reply(choice).await),
                None => None,
            }
        };
        let window = self.focus_or_open(&target, audio_url.is_some());
        let (relayed, window) = tokio::join!(relay, window);

        ClickOutcome { relayed, window }
    }

    async fn relay_reply(&self, choice: &str) -> bool {
        let delivered = match self.api.post_reply(choice).await {
            Ok(()) => {
                info!("reply {choice:?} relayed");
                true
            }
            Err(e) => {
                warn!("reply relay failed: {e}");
                false
            }
        };
        self.telemetry.record(TelemetryEvent::PushActionRelayed { delivered });
        delivered
    }

    async fn focus_or_open(&self, target: &Url, navigate: bool) -> WindowOutcome {
        let clients = self.windows.list().await;
        if let Some(client) = clients.iter().find(|c| in_scope(&self.scope, &c.url)) {
            if let Err(e) = self.windows.focus(client).await {
                warn!("could not focus window {}: {e}", client.id);
                return WindowOutcome::Failed;
            }
            let navigated = navigate
                && match self.windows.navigate(client, target).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("could not navigate window {}: {e}", client.id);
                        false
                    }
                };
            debug!("focused window {} (navigated: {navigated})", client.id);
            self.telemetry.record(TelemetryEvent::WindowFocused { navigated });
            return WindowOutcome::Focused { navigated };
        }

        match self.windows.open(target).await {
            Ok(()) => {
                debug!("opened {target}");
                self.telemetry.record(TelemetryEvent::WindowOpened);
                WindowOutcome::Opened
            }
            Err(e) => {
                warn!("could not open {target}: {e}");
                WindowOutcome::Failed
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
