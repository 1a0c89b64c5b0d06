use anyhow::Context;
use reqwest::Url;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::ui::{Announcer, CallControl, EnableControl, Ui};
use crate::error::{ClientError, Result};
use crate::kernel::subscription::{PushPlatform, SubscriptionDescriptor};

/// Page surface rendered as console lines.
#[derive(Debug, Default)]
pub struct ConsoleUi {
    last_progress: Mutex<u8>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ui for ConsoleUi {
    fn set_call_control(&self, state: CallControl) {
        let marker = if state.is_interactive() { "" } else { " (disabled)" };
        println!("[CALL] {}{marker}", state.label());
    }

    fn set_enable_control(&self, state: EnableControl) {
        println!("[PUSH] {}", state.label());
    }

    fn set_status(&self, text: &str) {
        println!("[STATUS] {text}");
    }

    fn set_ringing(&self, on: bool) {
        println!("[RING] {}", if on { "ringing" } else { "quiet" });
    }

    fn set_hold_progress(&self, fraction: f32) {
        // Print in quarter steps only.
        let step = (fraction.clamp(0.0, 1.0) * 4.0).floor() as u8;
        let mut last = self.last_progress.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != step {
            *last = step;
            if step > 0 {
                println!("[HOLD] {}%", u32::from(step) * 25);
            }
        }
    }

    fn show_reply(&self, text: &str) {
        println!("[REPLY] {text}");
    }

    fn show_play_control(&self, clip_url: &str) {
        println!("[PLAY] type `play {clip_url}` to hear the reply");
    }
}

/// Plays clips and speaks text through external commands. Starting a new
/// announcement stops the one still playing.
#[derive(Debug)]
pub struct CommandAnnouncer {
    base_url: Url,
    player_cmd: Vec<String>,
    speech_cmd: Vec<String>,
    current: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandAnnouncer {
    pub fn new(base_url: Url, player_cmd: Vec<String>, speech_cmd: Vec<String>) -> Self {
        Self {
            base_url,
            player_cmd,
            speech_cmd,
            current: Mutex::new(None),
        }
    }

    fn spawn(&self, command: &[String], arg: &str) -> anyhow::Result<()> {
        let (program, args) = command.split_first().context("announcer command is empty")?;
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .arg(arg)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program:?}"))?;

        let (stop_tx, mut stop_rx) = oneshot::channel();
        if let Some(previous) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(stop_tx)
        {
            let _ = previous.send(());
        }

        let program = program.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => debug!("{program} exited: {status:?}"),
                _ = &mut stop_rx => { let _ = child.kill().await; }
            }
        });
        Ok(())
    }
}

impl Announcer for CommandAnnouncer {
    fn play_clip(&self, url: &str) -> anyhow::Result<()> {
        let resolved = self
            .base_url
            .join(url)
            .with_context(|| format!("bad clip url {url:?}"))?;
        info!("playing {resolved}");
        self.spawn(&self.player_cmd, resolved.as_str())
    }

    fn speak(&self, text: &str) -> anyhow::Result<()> {
        self.spawn(&self.speech_cmd, text)
    }
}

/// A terminal has no push service, so subscription always ends as
/// unsupported.
#[derive(Debug, Default)]
pub struct NoPushPlatform;

impl PushPlatform for NoPushPlatform {
    fn supports_push(&self) -> bool {
        false
    }

    async fn register_agent(&self) -> Result<()> {
        Err(ClientError::PlatformUnsupported)
    }

    async fn existing_subscription(&self) -> Result<Option<SubscriptionDescriptor>> {
        Ok(None)
    }

    async fn subscribe(&self, _server_key: &[u8]) -> Result<SubscriptionDescriptor> {
        Err(ClientError::PlatformUnsupported)
    }
}
