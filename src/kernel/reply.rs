use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::ring::RingFeedback;
use super::telemetry::event::{AnnounceChannel, RingStopReason, TelemetryEvent};
use super::telemetry::Telemetry;
use crate::outputs::ui::{Announcer, Ui};

/// Known reply phrase and the pre-recorded clip that says it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseClip {
    pub phrase: String,
    pub clip_url: String,
}

impl PhraseClip {
    pub fn new(phrase: impl Into<String>, clip_url: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            clip_url: clip_url.into(),
        }
    }

    pub fn default_table() -> Vec<PhraseClip> {
        vec![
            PhraseClip::new("1 minutes", "/static/audio/1min.mp3"),
            PhraseClip::new("5 minutes", "/static/audio/5min.mp3"),
            PhraseClip::new("10 minutes", "/static/audio/10min.mp3"),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Clip(String),
    Speech(String),
}

/// First table entry whose phrase occurs in the message wins; otherwise the
/// literal text is spoken.
pub fn choose_announcement(table: &[PhraseClip], message: &str) -> Announcement {
    table
        .iter()
        .find(|entry| message.contains(entry.phrase.as_str()))
        .map(|entry| Announcement::Clip(entry.clip_url.clone()))
        .unwrap_or_else(|| Announcement::Speech(message.to_string()))
}

/// "Reply received" handling shared by the poll path and page loads.
///
/// Safe to trigger more than once for the same reply: it only stops ringing
/// (idempotent) and plays one announcement per call.
#[derive(Clone)]
pub struct ReplyHandler {
    ring: RingFeedback,
    ui: Arc<dyn Ui>,
    announcer: Arc<dyn Announcer>,
    table: Arc<[PhraseClip]>,
    telemetry: Telemetry,
}

impl ReplyHandler {
    pub fn new(
        ring: RingFeedback,
        ui: Arc<dyn Ui>,
        announcer: Arc<dyn Announcer>,
        table: Vec<PhraseClip>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            ring,
            ui,
            announcer,
            table: table.into(),
            telemetry,
        }
    }

    pub fn handle(&self, message: &str) -> Announcement {
        self.ring.stop(RingStopReason::ReplyArrived);
        self.ui.set_status("Reply Received!");
        self.ui.show_reply(message);

        let announcement = choose_announcement(&self.table, message);
        match &announcement {
            Announcement::Clip(url) => {
                info!("Playing audio: {url}");
                if let Err(e) = self.announcer.play_clip(url) {
                    warn!("Audio play failed: {e}");
                }
                self.telemetry.record(TelemetryEvent::ReplyAnnounced {
                    channel: AnnounceChannel::Clip,
                });
            }
            Announcement::Speech(text) => {
                if let Err(e) = self.announcer.speak(text) {
                    warn!("Speech synthesis failed: {e}");
                }
                self.telemetry.record(TelemetryEvent::ReplyAnnounced {
                    channel: AnnounceChannel::Speech,
                });
            }
        }
        announcement
    }
}
