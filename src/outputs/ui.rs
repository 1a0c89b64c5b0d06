/// Visible state of the call control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallControl {
    Ready,
    Calling,
    Sent,
    Disabled,
}

impl CallControl {
    pub fn is_interactive(&self) -> bool {
        matches!(self, CallControl::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallControl::Ready => "RING BELL",
            CallControl::Calling => "Calling...",
            CallControl::Sent => "Ring Initialized",
            CallControl::Disabled => "RING BELL",
        }
    }
}

/// Visible state of the "enable notifications" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableControl {
    /// Push is available but not subscribed; clicking subscribes.
    Offer,
    Busy,
    Enabled,
    /// Terminal: no push capability.
    Unavailable,
    /// Terminal until the platform setting changes.
    PermissionDenied,
}

impl EnableControl {
    pub fn is_interactive(&self) -> bool {
        matches!(self, EnableControl::Offer)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnableControl::Offer => "Enable Notifications",
            EnableControl::Busy => "Enabling...",
            EnableControl::Enabled => "Notifications Enabled",
            EnableControl::Unavailable => "Push Not Supported",
            EnableControl::PermissionDenied => "Permission Denied",
        }
    }
}

/// Page surface. Implementations must tolerate being called from any task.
pub trait Ui: Send + Sync + 'static {
    fn set_call_control(&self, state: CallControl);
    fn set_enable_control(&self, state: EnableControl);
    fn set_status(&self, text: &str);
    fn set_ringing(&self, on: bool);
    /// `0.0..=1.0` of the hold threshold; `0.0` hides the indicator.
    fn set_hold_progress(&self, fraction: f32);
    fn show_reply(&self, text: &str);
    /// Manual play affordance for a clip that may not autoplay.
    fn show_play_control(&self, clip_url: &str);
}

/// Audio output for replies.
pub trait Announcer: Send + Sync + 'static {
    fn play_clip(&self, url: &str) -> anyhow::Result<()>;
    fn speak(&self, text: &str) -> anyhow::Result<()>;
}
