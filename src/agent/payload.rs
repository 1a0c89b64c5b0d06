use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// One reply choice. The server may send a bare label or an
/// `{action, title}` pair; for a bare label both are the label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReplyAction {
    Label(String),
    Button { action: String, title: String },
}

impl ReplyAction {
    /// Value relayed to the server when this button is pressed.
    pub fn id(&self) -> &str {
        match self {
            ReplyAction::Label(label) => label,
            ReplyAction::Button { action, .. } => action,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ReplyAction::Label(label) => label,
            ReplyAction::Button { title, .. } => title,
        }
    }
}

/// Push message body sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub actions: Vec<ReplyAction>,
    #[serde(rename = "audioUrl", default)]
    pub audio_url: Option<String>,
}

impl NotificationPayload {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| ClientError::InvalidPayload(e.to_string()))
    }
}

/// Metadata carried by a shown notification and handed back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub arrived_at_ms: u64,
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// A persistent system notification built from one push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
    pub vibrate: Vec<u32>,
    /// Stays on screen until the user interacts with it.
    pub require_interaction: bool,
    pub data: NotificationData,
}

impl Notification {
    pub fn from_payload(
        id: NotificationId,
        payload: NotificationPayload,
        arrived_at_ms: u64,
    ) -> Self {
        Self {
            id,
            title: payload.title,
            body: payload.body,
            actions: payload
                .actions
                .iter()
                .map(|a| NotificationAction {
                    action: a.id().to_string(),
                    title: a.title().to_string(),
                })
                .collect(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            require_interaction: true,
            data: NotificationData {
                arrived_at_ms,
                audio_url: payload.audio_url,
            },
        }
    }
}
