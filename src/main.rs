use anyhow::Context;
use reqwest::Url;
use ringback::audio::capture::CpalRecorder;
use ringback::audio::chime::CpalChime;
use ringback::config::ClientConfig;
use ringback::kernel::event::{PressEnd, PressSource};
use ringback::kernel::gesture::{GestureController, GestureSettings};
use ringback::kernel::poller::ReplyPoller;
use ringback::kernel::reply::ReplyHandler;
use ringback::kernel::ring::RingFeedback;
use ringback::kernel::subscription::SubscriptionManager;
use ringback::kernel::telemetry::Telemetry;
use ringback::outputs::autoplay::on_page_load;
use ringback::outputs::console::{CommandAnnouncer, ConsoleUi, NoPushPlatform};
use ringback::outputs::ui::{Announcer, CallControl, Ui};
use ringback::services::api::client::ApiClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const HELP: &str = "commands: press [mouse|touch] | release | leave | touchcancel | cancel \
                    | subscribe | load <url> | play <url> | stats | quit";

fn parse_source(arg: Option<&str>) -> PressSource {
    match arg {
        Some("touch") => PressSource::Touch,
        _ => PressSource::Mouse,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ClientConfig::load(config_path.as_deref())?;
    tracing::info!("ringback client talking to {}", config.base_url);

    let telemetry = Telemetry::new();
    let ui: Arc<dyn Ui> = Arc::new(ConsoleUi::new());
    let base_url = Url::parse(&config.base_url)?;
    let announcer: Arc<dyn Announcer> = Arc::new(CommandAnnouncer::new(
        base_url,
        config.player_cmd.clone(),
        config.speech_cmd.clone(),
    ));
    let api = Arc::new(ApiClient::from_config(&config)?);

    let ring = RingFeedback::new(
        Arc::new(CpalChime),
        ui.clone(),
        telemetry.clone(),
        config.ring_period(),
        config.ring_safety(),
    );
    let handler = ReplyHandler::new(
        ring.clone(),
        ui.clone(),
        announcer.clone(),
        config.phrase_clips.clone(),
        telemetry.clone(),
    );
    let poller = ReplyPoller::new(
        api.clone(),
        handler,
        ui.clone(),
        telemetry.clone(),
        config.poll_interval(),
        config.poll_max_attempts,
    );
    let gestures = GestureController::new(
        api.clone(),
        Arc::new(CpalRecorder::default()),
        ring,
        poller,
        ui.clone(),
        telemetry.clone(),
        GestureSettings::from(&config),
    );
    let subscriptions = SubscriptionManager::new(
        Arc::new(NoPushPlatform),
        api,
        ui.clone(),
        telemetry.clone(),
        config.vapid_public_key.clone(),
    );

    if let Err(e) = subscriptions.initialize().await {
        tracing::info!("push notifications unavailable: {e}");
    }
    ui.set_call_control(CallControl::Ready);
    on_page_load(&config.scope_url()?, announcer.as_ref(), ui.as_ref());

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut source = PressSource::Mouse;

    while let Ok(Some(line)) = lines.next_line().await {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else { continue };
        let arg = words.next();

        match command {
            "press" => {
                source = parse_source(arg);
                gestures.press_start(source);
            }
            "release" => gestures.press_end(source, PressEnd::Release),
            "leave" => gestures.press_end(source, PressEnd::Leave),
            "touchcancel" => gestures.press_end(PressSource::Touch, PressEnd::TouchCancel),
            "cancel" => gestures.cancel_call(),
            "subscribe" => {
                let subscriptions = subscriptions.clone();
                tokio::spawn(async move {
                    if let Err(e) = subscriptions.subscribe().await {
                        tracing::debug!("subscribe: {e}");
                    }
                });
            }
            "load" => match arg.map(Url::parse) {
                Some(Ok(url)) => {
                    on_page_load(&url, announcer.as_ref(), ui.as_ref());
                }
                Some(Err(e)) => println!("bad url: {e}"),
                None => println!("usage: load <url>"),
            },
            "play" => match arg {
                Some(clip) => {
                    if let Err(e) = announcer.play_clip(clip) {
                        tracing::warn!("Audio play failed: {e}");
                    }
                }
                None => println!("usage: play <url>"),
            },
            "stats" => println!("{:#?}", telemetry.snapshot()),
            "quit" | "exit" => break,
            _ => println!("{HELP}"),
        }
    }

    tracing::info!("ringback client stopped");
    Ok(())
}
