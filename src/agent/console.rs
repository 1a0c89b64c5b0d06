use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use super::payload::{Notification, NotificationId};
use super::worker::{NotificationCenter, WindowClient, WindowClients};
use crate::error::Result;

/// Prints notifications and keeps them until they are closed, so a console
/// `click` can find them again.
#[derive(Debug, Default)]
pub struct ConsoleNotifications {
    shown: Mutex<BTreeMap<NotificationId, Notification>>,
}

impl ConsoleNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<NotificationId, Notification>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.lock().get(&id).cloned()
    }

    pub fn open_ids(&self) -> Vec<NotificationId> {
        self.lock().keys().copied().collect()
    }
}

impl NotificationCenter for ConsoleNotifications {
    async fn show(&self, notification: &Notification) -> Result<()> {
        println!("[NOTIFY #{}] {}: {}", notification.id, notification.title, notification.body);
        for action in &notification.actions {
            println!("    [{}] {}", action.action, action.title);
        }
        self.lock().insert(notification.id, notification.clone());
        Ok(())
    }

    fn close(&self, id: NotificationId) {
        self.lock().remove(&id);
    }
}

/// Pretend browser: remembers the pages it has "opened".
#[derive(Debug, Default)]
pub struct ConsoleWindows {
    clients: Mutex<Vec<WindowClient>>,
}

impl ConsoleWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WindowClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WindowClients for ConsoleWindows {
    async fn list(&self) -> Vec<WindowClient> {
        self.lock().clone()
    }

    async fn focus(&self, client: &WindowClient) -> Result<()> {
        println!("[WINDOW {}] focus {}", client.id, client.url);
        Ok(())
    }

    async fn navigate(&self, client: &WindowClient, url: &Url) -> Result<()> {
        println!("[WINDOW {}] navigate {url}", client.id);
        if let Some(existing) = self.lock().iter_mut().find(|c| c.id == client.id) {
            existing.url = url.clone();
        }
        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<()> {
        let mut clients = self.lock();
        let id = clients.len() as u64 + 1;
        println!("[WINDOW {id}] open {url}");
        info!("run `ringback` with `load {url}` to continue in the page client");
        clients.push(WindowClient { id, url: url.clone() });
        Ok(())
    }
}
