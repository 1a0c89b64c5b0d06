use anyhow::Context;
use ringback::agent::console::{ConsoleNotifications, ConsoleWindows};
use ringback::agent::payload::NotificationId;
use ringback::agent::worker::{NotificationClick, PushAgent};
use ringback::config::ClientConfig;
use ringback::kernel::telemetry::Telemetry;
use ringback::services::api::client::ApiClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

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
    let scope = config.scope_url()?;
    tracing::info!("push agent active for {scope}");

    let notifications = Arc::new(ConsoleNotifications::new());
    let agent = PushAgent::new(
        Arc::new(ApiClient::from_config(&config)?),
        notifications.clone(),
        Arc::new(ConsoleWindows::new()),
        scope,
        Telemetry::new(),
    );

    println!("paste a push payload as JSON, or `click <id> [action]`");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') {
            if let Err(e) = agent.on_push(line.as_bytes()).await {
                tracing::error!("push dropped: {e}");
            }
            continue;
        }

        let mut words = line.splitn(3, ' ');
        match (words.next(), words.next().map(str::parse::<u64>)) {
            (Some("click"), Some(Ok(id))) => {
                let Some(notification) = notifications.get(NotificationId(id)) else {
                    println!("no open notification #{id} (open: {:?})", notifications.open_ids());
                    continue;
                };
                let action = words.next().map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
                let outcome = agent
                    .on_notification_click(NotificationClick { notification, action })
                    .await;
                tracing::info!("click handled: {outcome:?}");
            }
            (Some("quit" | "exit"), _) => break,
            _ => println!("expected a JSON payload or `click <id> [action]`"),
        }
    }

    Ok(())
}
