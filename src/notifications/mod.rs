mod gotify;
mod ntfy;

pub use gotify::GotifyClient;
pub use ntfy::{NtfyAuth, NtfyClient};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::config::NotificationsConfig;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendError(#[from] reqwest::Error),

    #[error("Notification service returned error: {0}")]
    ServiceError(String),

    #[error("No notification services configured")]
    NoServicesConfigured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Fixed identifier; a new message with the same id replaces the previous one
    pub id: u32,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NotificationMessage {
    pub fn new(id: u32, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            priority: Priority::default(),
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Tag receivers use to collapse repeated messages
    pub fn replace_tag(&self) -> String {
        format!("tick-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Urgent,
}

impl Priority {
    pub fn as_ntfy_priority(self) -> u8 {
        match self {
            Priority::Min => 1,
            Priority::Low => 2,
            Priority::Default => 3,
            Priority::High => 4,
            Priority::Urgent => 5,
        }
    }

    pub fn as_gotify_priority(self) -> u8 {
        match self {
            Priority::Min => 0,
            Priority::Low => 2,
            Priority::Default => 5,
            Priority::High => 7,
            Priority::Urgent => 10,
        }
    }
}

/// Notification category that must be registered once before posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Priority,
}

/// Where the tick notifier delivers its messages.
///
/// The host decides what "permission" and "foreground" mean; the notifier
/// only asks.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    async fn register_channel(&self, channel: &NotificationChannel);

    async fn permission_granted(&self) -> bool;

    async fn post(&self, message: &NotificationMessage) -> Result<(), NotificationError>;

    /// Keep the notifier alive with a persistent status message
    async fn start_foreground(&self, status: &NotificationMessage);

    /// Leave foreground mode. Push backends cannot retract a delivered
    /// message, so for them this only records the transition.
    async fn stop_foreground(&self);
}

/// Unified notification service that can send to multiple backends
pub struct NotificationService {
    ntfy: Option<NtfyClient>,
    gotify: Option<GotifyClient>,
    muted: AtomicBool,
    channel: std::sync::Mutex<Option<NotificationChannel>>,
}

impl NotificationService {
    pub fn new(ntfy: Option<NtfyClient>, gotify: Option<GotifyClient>) -> Self {
        Self {
            ntfy,
            gotify,
            muted: AtomicBool::new(false),
            channel: std::sync::Mutex::new(None),
        }
    }

    pub fn from_config(client: Client, config: &NotificationsConfig) -> Self {
        let ntfy = config.ntfy.as_ref().map(|n| {
            // Determine auth method: prefer token, then basic auth, then none
            let auth = if let Some(token) = &n.token {
                Some(NtfyAuth::Token(token.clone()))
            } else if let (Some(username), Some(password)) = (&n.username, &n.password) {
                Some(NtfyAuth::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })
            } else {
                None
            };
            NtfyClient::new(client.clone(), &n.url, &n.topic, auth)
        });

        let gotify = config
            .gotify
            .as_ref()
            .map(|g| GotifyClient::new(client.clone(), &g.url, &g.token));

        Self::new(ntfy, gotify)
    }

    pub fn is_configured(&self) -> bool {
        self.ntfy.is_some() || self.gotify.is_some()
    }

    /// User-level opt out, the terminal equivalent of revoking permission
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
        tracing::info!(muted = muted, "Notification permission changed");
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    fn tag(&self, message: &NotificationMessage) -> NotificationMessage {
        let mut message = message.clone();
        let replace_tag = message.replace_tag();
        message.tags.push(replace_tag);
        if let Ok(channel) = self.channel.lock() {
            if let Some(channel) = channel.as_ref() {
                message.tags.push(channel.id.clone());
            }
        }
        message
    }

    /// Send notification to all configured services
    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        if !self.is_configured() {
            return Err(NotificationError::NoServicesConfigured);
        }

        let message = self.tag(message);
        let mut errors = Vec::new();

        if let Some(ref ntfy) = self.ntfy {
            if let Err(e) = ntfy.send(&message).await {
                tracing::error!(error = %e, "Failed to send ntfy notification");
                errors.push(e);
            } else {
                tracing::info!("Sent notification via ntfy");
            }
        }

        if let Some(ref gotify) = self.gotify {
            if let Err(e) = gotify.send(&message).await {
                tracing::error!(error = %e, "Failed to send gotify notification");
                errors.push(e);
            } else {
                tracing::info!("Sent notification via gotify");
            }
        }

        // Return success if at least one service succeeded
        let configured = [self.ntfy.is_some(), self.gotify.is_some()]
            .iter()
            .filter(|&&x| x)
            .count();
        if errors.len() < configured {
            Ok(())
        } else if let Some(e) = errors.into_iter().next() {
            Err(e)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationSurface for NotificationService {
    async fn register_channel(&self, channel: &NotificationChannel) {
        if let Ok(mut registered) = self.channel.lock() {
            if registered.as_ref() != Some(channel) {
                tracing::debug!(channel = %channel.id, "Registered notification channel");
                *registered = Some(channel.clone());
            }
        }
    }

    async fn permission_granted(&self) -> bool {
        self.is_configured() && !self.is_muted()
    }

    async fn post(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        self.send(message).await
    }

    async fn start_foreground(&self, status: &NotificationMessage) {
        tracing::info!(title = %status.title, body = %status.body, "Entering foreground mode");
        if self.permission_granted().await {
            if let Err(e) = self.send(status).await {
                tracing::warn!(error = %e, "Failed to post foreground status");
            }
        }
    }

    async fn stop_foreground(&self) {
        tracing::info!("Leaving foreground mode");
    }
}
