use thiserror::Error;

/// Failures surfaced by the client core.
///
/// Every variant except `PlatformUnsupported` and `PermissionDenied` is
/// recoverable: the affected control goes back to an interactive state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("push messaging is not supported")]
    PlatformUnsupported,

    #[error("notification permission denied")]
    PermissionDenied,

    #[error("network failure: {0}")]
    Network(String),

    #[error("microphone unavailable: {0}")]
    CaptureDenied(String),

    #[error("no reply after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("invalid push server key: {0}")]
    InvalidServerKey(String),

    #[error("invalid push payload: {0}")]
    InvalidPayload(String),
}

impl ClientError {
    /// Terminal errors leave their control disabled until something outside
    /// this process changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientError::PlatformUnsupported | ClientError::PermissionDenied)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
