use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Input device that produced a press signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PressSource {
    Mouse,
    Touch,
}

/// The ways a press can terminate. All of them end the gesture the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PressEnd {
    Release,
    Leave,
    TouchCancel,
}

/// Server-issued dedup token. Numbers and strings compare by their JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self(s)),
            other => Some(Self(other.to_string())),
        }
    }
}

impl From<u64> for ReplyToken {
    fn from(v: u64) -> Self {
        Self(v.to_string())
    }
}

/// Body of `GET poll_reply`. A present `message` means a reply exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyRecord {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "timestamp", deserialize_with = "token_from_value")]
    pub token: Option<ReplyToken>,
}

impl ReplyRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn reply(message: impl Into<String>, token: impl Into<ReplyToken>) -> Self {
        Self {
            message: Some(message.into()),
            token: Some(token.into()),
        }
    }

    /// Empty strings count as "no reply yet".
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

fn token_from_value<'de, D>(deserializer: D) -> Result<Option<ReplyToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(ReplyToken::from_value))
}

/// Acknowledgment object returned by `POST call`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallAck {
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}

/// Body of `POST subscribe`'s response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeAck {
    #[serde(default)]
    pub status: Option<String>,
}

impl SubscribeAck {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_timestamp_token() {
        let record: ReplyRecord =
            serde_json::from_str(r#"{"message":"Be there in 5 minutes","timestamp":17}"#).unwrap();
        assert_eq!(record.message(), Some("Be there in 5 minutes"));
        assert_eq!(record.token, Some(ReplyToken::from(17)));
    }

    #[test]
    fn null_message_means_no_reply() {
        let record: ReplyRecord = serde_json::from_str(r#"{"message":null}"#).unwrap();
        assert_eq!(record.message(), None);
        assert_eq!(record.token, None);

        let blank: ReplyRecord = serde_json::from_str(r#"{"message":"","timestamp":3}"#).unwrap();
        assert_eq!(blank.message(), None);
    }

    #[test]
    fn string_token_kept_verbatim() {
        let record: ReplyRecord =
            serde_json::from_str(r#"{"message":"ok","timestamp":"2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(record.token.unwrap().as_str(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn subscribe_ack_requires_success_status() {
        let ok: SubscribeAck = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        let other: SubscribeAck =
            serde_json::from_str(r#"{"error":"No subscription data"}"#).unwrap();
        assert!(ok.is_success());
        assert!(!other.is_success());
    }
}
