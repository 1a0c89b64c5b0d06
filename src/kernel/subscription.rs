use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use super::telemetry::event::{SubscriptionEvent, TelemetryEvent};
use super::telemetry::Telemetry;
use crate::error::{ClientError, Result};
use crate::outputs::ui::{EnableControl, Ui};
use crate::services::api::ServerApi;

/// Opaque subscription object handed out by the push platform and forwarded
/// verbatim to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionDescriptor(Value);

impl SubscriptionDescriptor {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.0.get("endpoint").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    PendingServerAck,
    Confirmed,
}

/// Push registration facilities of the host platform.
pub trait PushPlatform: Send + Sync + 'static {
    fn supports_push(&self) -> bool;

    /// Installs the background agent. Must succeed before `subscribe`.
    fn register_agent(&self) -> impl Future<Output = Result<()>> + Send;

    fn existing_subscription(
        &self,
    ) -> impl Future<Output = Result<Option<SubscriptionDescriptor>>> + Send;

    /// Prompts for permission when needed. A refusal is `PermissionDenied`.
    fn subscribe(
        &self,
        server_key: &[u8],
    ) -> impl Future<Output = Result<SubscriptionDescriptor>> + Send;
}

/// Decodes the push service public key. Url-safe base64 is expected, the
/// standard alphabet is accepted too. Trailing padding is tolerated.
pub fn decode_server_key(key: &str) -> Result<Vec<u8>> {
    let trimmed = key.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(ClientError::InvalidServerKey("key is empty".into()));
    }
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| ClientError::InvalidServerKey(e.to_string()))
}

#[derive(Debug)]
struct SubscriptionInner {
    state: SubscriptionState,
    descriptor: Option<SubscriptionDescriptor>,
    agent_registered: bool,
    // Set once the control can no longer be used this session.
    terminal: Option<EnableControl>,
}

pub struct SubscriptionManager<P: PushPlatform, S: ServerApi> {
    inner: Arc<Mutex<SubscriptionInner>>,
    platform: Arc<P>,
    api: Arc<S>,
    ui: Arc<dyn Ui>,
    telemetry: Telemetry,
    server_key: Option<String>,
}

impl<P: PushPlatform, S: ServerApi> Clone for SubscriptionManager<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            platform: self.platform.clone(),
            api: self.api.clone(),
            ui: self.ui.clone(),
            telemetry: self.telemetry.clone(),
            server_key: self.server_key.clone(),
        }
    }
}

impl<P: PushPlatform, S: ServerApi> SubscriptionManager<P, S> {
    pub fn new(
        platform: Arc<P>,
        api: Arc<S>,
        ui: Arc<dyn Ui>,
        telemetry: Telemetry,
        server_key: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SubscriptionInner {
                state: SubscriptionState::Unsubscribed,
                descriptor: None,
                agent_registered: false,
                terminal: None,
            })),
            platform,
            api,
            ui,
            telemetry,
            server_key,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SubscriptionState {
        self.lock().state
    }

    pub fn descriptor(&self) -> Option<SubscriptionDescriptor> {
        self.lock().descriptor.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().terminal.is_some()
    }

    pub fn is_agent_registered(&self) -> bool {
        self.lock().agent_registered
    }

    /// Checks platform support and installs the background agent once.
    /// Unsupported platforms become terminal.
    async fn ensure_agent(&self) -> Result<()> {
        if !self.platform.supports_push() {
            let first = self.lock().terminal.replace(EnableControl::Unavailable).is_none();
            if first {
                warn!("push messaging is not supported");
                self.telemetry
                    .record(TelemetryEvent::Subscription(SubscriptionEvent::Unsupported));
            }
            self.ui.set_enable_control(EnableControl::Unavailable);
            return Err(ClientError::PlatformUnsupported);
        }
        if self.lock().agent_registered {
            return Ok(());
        }

        if let Err(e) = self.platform.register_agent().await {
            error!("background agent registration failed: {e}");
            self.ui.set_status(&format!("Agent error: {e}"));
            return Err(e);
        }
        self.lock().agent_registered = true;
        info!("background agent registered");
        self.telemetry
            .record(TelemetryEvent::Subscription(SubscriptionEvent::AgentRegistered));
        Ok(())
    }

    /// Registers the agent and reflects any existing subscription.
    ///
    /// When registration fails the control is still offered; the next
    /// `subscribe` retries the registration first.
    pub async fn initialize(&self) -> Result<SubscriptionState> {
        if let Err(e) = self.ensure_agent().await {
            if !e.is_terminal() {
                self.ui.set_enable_control(EnableControl::Offer);
            }
            return Err(e);
        }

        let existing = match self.platform.existing_subscription().await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("could not read existing subscription: {e}");
                None
            }
        };

        let state = {
            let mut inner = self.lock();
            if let Some(descriptor) = existing {
                inner.state = SubscriptionState::Confirmed;
                inner.descriptor = Some(descriptor);
            }
            inner.state
        };

        self.ui.set_enable_control(match state {
            SubscriptionState::Confirmed => EnableControl::Enabled,
            SubscriptionState::PendingServerAck => EnableControl::Busy,
            SubscriptionState::Unsubscribed => EnableControl::Offer,
        });
        Ok(state)
    }

    /// No-op while terminal, confirmed or already in flight. Never succeeds
    /// without a registered background agent.
    pub async fn subscribe(&self) -> Result<SubscriptionState> {
        {
            let mut inner = self.lock();
            if inner.terminal.is_some() || inner.state != SubscriptionState::Unsubscribed {
                return Ok(inner.state);
            }
            inner.state = SubscriptionState::PendingServerAck;
        }
        self.ui.set_enable_control(EnableControl::Busy);

        if let Err(e) = self.ensure_agent().await {
            self.lock().state = SubscriptionState::Unsubscribed;
            if !e.is_terminal() {
                self.ui.set_enable_control(EnableControl::Offer);
            }
            return Err(e);
        }

        match self.register().await {
            Ok(descriptor) => {
                {
                    let mut inner = self.lock();
                    inner.state = SubscriptionState::Confirmed;
                    inner.descriptor = Some(descriptor);
                }
                info!("push subscription confirmed");
                self.ui.set_enable_control(EnableControl::Enabled);
                self.ui.set_status("Subscribed successfully!");
                self.telemetry
                    .record(TelemetryEvent::Subscription(SubscriptionEvent::Confirmed));
                Ok(SubscriptionState::Confirmed)
            }
            Err(ClientError::PermissionDenied) => {
                {
                    let mut inner = self.lock();
                    inner.state = SubscriptionState::Unsubscribed;
                    inner.terminal = Some(EnableControl::PermissionDenied);
                }
                warn!("notification permission denied");
                self.ui.set_enable_control(EnableControl::PermissionDenied);
                self.telemetry
                    .record(TelemetryEvent::Subscription(SubscriptionEvent::Denied));
                Err(ClientError::PermissionDenied)
            }
            Err(e) => {
                self.lock().state = SubscriptionState::Unsubscribed;
                warn!("subscription failed: {e}");
                self.ui.set_enable_control(EnableControl::Offer);
                self.ui.set_status(&format!("Failed to subscribe: {e}"));
                self.telemetry
                    .record(TelemetryEvent::Subscription(SubscriptionEvent::Failed));
                Err(e)
            }
        }
    }

    async fn register(&self) -> Result<SubscriptionDescriptor> {
        let key = self
            .server_key
            .as_deref()
            .ok_or_else(|| ClientError::InvalidServerKey("no server key configured".into()))?;
        let key = decode_server_key(key)?;

        let descriptor = self.platform.subscribe(&key).await?;
        let ack = self.api.subscribe(&descriptor).await?;
        if !ack.is_success() {
            return Err(ClientError::Network(format!(
                "server rejected subscription: {}",
                ack.status.as_deref().unwrap_or("no status")
            )));
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_padded_and_unpadded_keys() {
        assert_eq!(decode_server_key("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_server_key("AQI=").unwrap(), vec![1, 2]);
        assert_eq!(decode_server_key("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode_server_key("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn accepts_standard_alphabet_keys() {
        assert_eq!(decode_server_key("+/8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_server_key("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_server_key("a+b/").unwrap(), decode_server_key("a-b_").unwrap());
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(matches!(decode_server_key(""), Err(ClientError::InvalidServerKey(_))));
        assert!(matches!(decode_server_key("a b!"), Err(ClientError::InvalidServerKey(_))));
    }

    #[test]
    fn descriptor_serializes_verbatim() {
        let raw = serde_json::json!({
            "endpoint": "https://push.example/abc",
            "keys": { "p256dh": "x" },
        });
        let descriptor = SubscriptionDescriptor::new(raw.clone());
        assert_eq!(serde_json::to_value(&descriptor).unwrap(), raw);
        assert_eq!(descriptor.endpoint(), Some("https://push.example/abc"));
    }
}
