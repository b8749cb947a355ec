use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::config::TickerConfig;
use crate::notifications::{
    NotificationChannel, NotificationMessage, NotificationSurface, Priority,
};
use crate::settings::{SettingsChannel, TimerOption, TimerSubscription};

use super::state::{SchedulerState, SchedulerStatus};

/// Every tick reuses this id so a new notification replaces the previous one
pub const NOTIFICATION_ID: u32 = 1;
pub const CHANNEL_ID: &str = "popup_service_channel";

const COMMAND_CHANNEL_CAPACITY: usize = 8;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Scheduler task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug)]
enum SchedulerCommand {
    Restart,
    Stop,
}

fn notification_channel() -> NotificationChannel {
    NotificationChannel {
        id: CHANNEL_ID.to_string(),
        name: "Popup Service Channel".to_string(),
        description: "Notifications from Popup Service".to_string(),
        importance: Priority::High,
    }
}

/// Periodic tick notifier driven by the persisted timer option
pub struct NotificationScheduler;

impl NotificationScheduler {
    /// Start the notifier on the current runtime.
    ///
    /// The settings subscription is taken before this returns, so changes
    /// written immediately afterwards are not missed.
    pub fn spawn(
        settings: &SettingsChannel,
        surface: Arc<dyn NotificationSurface>,
        ticker: TickerConfig,
    ) -> SchedulerHandle {
        let state = SchedulerState::new();
        let (status_tx, status_rx) = watch::channel(state.status());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let subscription = settings.subscribe();

        let runner = Runner {
            surface,
            ticker,
            state,
            next_tick: None,
            foreground: false,
            status: status_tx,
        };

        let task = tokio::spawn(runner.run(settings.clone(), subscription, command_rx));

        SchedulerHandle {
            commands: command_tx,
            status: status_rx,
            task,
        }
    }
}

/// Control surface for a running notifier.
///
/// Dropping the handle detaches the notifier; it keeps following the
/// settings until they disable it.
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    status: watch::Receiver<SchedulerStatus>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Re-arm the pending tick a full interval from now (no-op unless active)
    pub async fn restart(&self) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::Restart).await
    }

    pub async fn stop(&self) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::Stop).await
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the notifier to terminate
    pub async fn join(self) -> Result<(), SchedulerError> {
        drop(self.commands);
        self.task.await?;
        Ok(())
    }

    async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }
}

struct Runner {
    surface: Arc<dyn NotificationSurface>,
    ticker: TickerConfig,
    state: SchedulerState,
    /// The single pending tick; replacing it cancels the previous one
    next_tick: Option<Instant>,
    foreground: bool,
    status: watch::Sender<SchedulerStatus>,
}

impl Runner {
    async fn run(
        mut self,
        settings: SettingsChannel,
        subscription: TimerSubscription,
        mut commands: mpsc::Receiver<SchedulerCommand>,
    ) {
        self.surface.register_channel(&notification_channel()).await;

        let option = match settings.read_timer_option().await {
            Ok(option) => option,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read timer option, treating as disabled");
                TimerOption::Disabled
            }
        };
        // Only the subscription is kept, so the channel can close under us
        drop(settings);
        self.start(option).await;

        let mut subscription = Some(subscription);
        let mut commands_open = true;

        loop {
            let deadline = self.next_tick;

            tokio::select! {
                _ = wait_until(deadline), if deadline.is_some() => {
                    self.tick().await;
                }
                change = next_change(&mut subscription), if subscription.is_some() => {
                    match change {
                        Some(option) => {
                            if self.on_setting_changed(option).await.is_break() {
                                break;
                            }
                        }
                        None => {
                            tracing::debug!("Settings channel closed, no longer listening");
                            subscription = None;
                        }
                    }
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(SchedulerCommand::Restart) => self.restart(),
                        Some(SchedulerCommand::Stop) => break,
                        None => {
                            tracing::debug!("Scheduler handle dropped, running detached");
                            commands_open = false;
                        }
                    }
                }
                else => break,
            }
        }

        self.shutdown(subscription).await;
    }

    async fn start(&mut self, option: TimerOption) {
        match option.interval() {
            Some(interval) => self.activate(interval).await,
            None => {
                self.state.idle();
                self.publish();
                tracing::info!("Tick notifier idle, timer option is disabled");
            }
        }
    }

    async fn activate(&mut self, interval: Duration) {
        self.state.activate(interval);

        if !self.foreground {
            let status = NotificationMessage::new(
                NOTIFICATION_ID,
                self.ticker.title.clone(),
                "Popup Service Running",
            );
            self.surface.start_foreground(&status).await;
            self.foreground = true;
        }

        self.arm(interval);
        self.publish();
        tracing::info!(interval_secs = interval.as_secs(), "Tick notifier active");
    }

    async fn on_setting_changed(&mut self, option: TimerOption) -> ControlFlow<()> {
        tracing::debug!(option = %option, "Timer option changed");
        self.next_tick = None;

        match option.interval() {
            Some(interval) => {
                self.activate(interval).await;
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(()),
        }
    }

    fn restart(&mut self) {
        if let Some(interval) = self.state.interval() {
            tracing::debug!("Restart requested, re-arming tick");
            self.arm(interval);
        }
    }

    async fn tick(&mut self) {
        let Some(interval) = self.state.interval() else {
            self.next_tick = None;
            return;
        };

        if self.surface.permission_granted().await {
            let sequence = self.state.next_sequence();
            let message = NotificationMessage::new(
                NOTIFICATION_ID,
                self.ticker.title.clone(),
                format!("{} {}", self.ticker.body_prefix, sequence),
            )
            .with_priority(Priority::High);

            if let Err(e) = self.surface.post(&message).await {
                tracing::error!(sequence = sequence, error = %e, "Failed to post tick notification");
            } else {
                tracing::debug!(sequence = sequence, "Posted tick notification");
            }
            metrics::counter!("nimbus_ticks_total", "outcome" => "emitted").increment(1);
        } else {
            tracing::debug!("Notification permission missing, skipping tick");
            metrics::counter!("nimbus_ticks_total", "outcome" => "skipped").increment(1);
        }

        self.arm(interval);
        self.publish();
    }

    fn arm(&mut self, interval: Duration) {
        self.next_tick = Some(Instant::now() + interval);
    }

    async fn shutdown(mut self, subscription: Option<TimerSubscription>) {
        self.next_tick = None;
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        if self.foreground {
            self.surface.stop_foreground().await;
            self.foreground = false;
        }
        self.state.stop();
        self.publish();
        tracing::info!(sequence = self.state.status().sequence, "Tick notifier stopped");
    }

    fn publish(&self) {
        self.status.send_replace(self.state.status());
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_change(subscription: &mut Option<TimerSubscription>) -> Option<TimerOption> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
