use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Toast-style message for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: Option<String>,
}

/// Fan-out of notifications to whoever renders them.
///
/// Sending with no subscriber attached is not an error; the message is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn info(&self, title: &str, description: Option<String>) {
        self.emit(NotificationLevel::Info, title, description);
    }

    pub fn success(&self, title: &str, description: Option<String>) {
        self.emit(NotificationLevel::Success, title, description);
    }

    pub fn error(&self, title: &str, description: Option<String>) {
        self.emit(NotificationLevel::Error, title, description);
    }

    fn emit(&self, level: NotificationLevel, title: &str, description: Option<String>) {
        let _ = self.sender.send(Notification {
            level,
            title: title.to_string(),
            description,
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// `0x1234...abcd` form used in notification text.
pub fn short_hex(value: &str) -> String {
    if value.len() <= 12 {
        return value.to_string();
    }
    match (value.get(..6), value.get(value.len() - 4..)) {
        (Some(head), Some(tail)) => format!("{}...{}", head, tail),
        _ => value.to_string(),
    }
}
