mod service;
mod state;

pub use service::{
    NotificationScheduler, SchedulerError, SchedulerHandle, CHANNEL_ID, NOTIFICATION_ID,
};
pub use state::{SchedulerPhase, SchedulerStatus};
