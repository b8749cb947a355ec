mod storage;
mod timer;

pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use timer::TimerOption;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Key the timer option label is persisted under
pub const TIMER_OPTION_KEY: &str = "timer_option_key";

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Settings file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persisted settings plus an in-process broadcast of timer option changes.
///
/// The settings screen writes through [`SettingsChannel::write_timer_option`];
/// the notifier holds a [`TimerSubscription`] and never polls the store.
#[derive(Clone)]
pub struct SettingsChannel {
    store: Arc<dyn KeyValueStore>,
    changes: broadcast::Sender<TimerOption>,
}

impl SettingsChannel {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { store, changes }
    }

    /// Read the persisted timer option; unset means disabled
    pub async fn read_timer_option(&self) -> Result<TimerOption, SettingsError> {
        let label = self.store.get(TIMER_OPTION_KEY).await?;
        Ok(label
            .map(TimerOption::from)
            .unwrap_or(TimerOption::Disabled))
    }

    /// Persist a new timer option and notify every live subscriber
    pub async fn write_timer_option(&self, option: TimerOption) -> Result<(), SettingsError> {
        self.store.set(TIMER_OPTION_KEY, option.label()).await?;

        // No receivers is fine: nobody is running to care
        let receivers = self.changes.send(option).unwrap_or(0);
        tracing::info!(option = %option, receivers = receivers, "Timer option updated");

        Ok(())
    }

    pub fn subscribe(&self) -> TimerSubscription {
        TimerSubscription {
            rx: self.changes.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

/// Receives timer option changes published after the subscription was created
#[derive(Debug)]
pub struct TimerSubscription {
    rx: broadcast::Receiver<TimerOption>,
}

impl TimerSubscription {
    /// Wait for the next change. Returns None once every sender is gone.
    pub async fn recv(&mut self) -> Option<TimerOption> {
        loop {
            match self.rx.recv().await {
                Ok(option) => return Some(option),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Timer option subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> SettingsChannel {
        SettingsChannel::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_unset_option_reads_disabled() {
        assert_eq!(
            channel().read_timer_option().await.unwrap(),
            TimerOption::Disabled
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let settings = channel();
        settings
            .write_timer_option(TimerOption::ThirtySeconds)
            .await
            .unwrap();

        assert_eq!(
            settings.read_timer_option().await.unwrap(),
            TimerOption::ThirtySeconds
        );
    }

    #[tokio::test]
    async fn test_stored_label_is_ui_label() {
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsChannel::new(store.clone());
        settings
            .write_timer_option(TimerOption::SixtyMinutes)
            .await
            .unwrap();

        assert_eq!(
            store.get(TIMER_OPTION_KEY).await.unwrap().as_deref(),
            Some("60 min")
        );
    }

    #[tokio::test]
    async fn test_subscriber_receives_changes_in_order() {
        let settings = channel();
        let mut sub = settings.subscribe();

        settings
            .write_timer_option(TimerOption::TenSeconds)
            .await
            .unwrap();
        settings
            .write_timer_option(TimerOption::Disabled)
            .await
            .unwrap();

        assert_eq!(sub.recv().await, Some(TimerOption::TenSeconds));
        assert_eq!(sub.recv().await, Some(TimerOption::Disabled));
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_receiver() {
        let settings = channel();
        let sub = settings.subscribe();
        assert_eq!(settings.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(settings.subscriber_count(), 0);

        // Writing with no subscribers still persists
        settings
            .write_timer_option(TimerOption::SixtySeconds)
            .await
            .unwrap();
        assert_eq!(
            settings.read_timer_option().await.unwrap(),
            TimerOption::SixtySeconds
        );
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_latest() {
        let settings = channel();
        let mut sub = settings.subscribe();

        for _ in 0..CHANGE_CHANNEL_CAPACITY {
            settings
                .write_timer_option(TimerOption::TenSeconds)
                .await
                .unwrap();
        }
        settings
            .write_timer_option(TimerOption::ThirtyMinutes)
            .await
            .unwrap();

        let mut last = None;
        while let Ok(Some(option)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await
        {
            last = Some(option);
        }
        assert_eq!(last, Some(TimerOption::ThirtyMinutes));
    }

    #[tokio::test]
    async fn test_closed_channel_ends_subscription() {
        let settings = channel();
        let mut sub = settings.subscribe();
        drop(settings);

        assert_eq!(sub.recv().await, None);
    }
}
