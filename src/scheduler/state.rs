use std::time::Duration;

/// Coarse lifecycle of the tick notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Terminated; nothing is pending and no listener is registered
    Stopped,
    /// Running and listening for setting changes, no interval armed
    Idle,
    /// Running with periodic ticks every `interval`
    Active { interval: Duration },
}

/// Read-only view of the notifier published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    /// Number of tick notifications emitted so far
    pub sequence: u64,
}

/// Mutable state owned by the scheduler task
#[derive(Debug, Default)]
pub(crate) struct SchedulerState {
    interval: Option<Duration>,
    enabled: bool,
    sequence: u64,
    stopped: bool,
}

impl SchedulerState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn idle(&mut self) {
        self.interval = None;
        self.enabled = false;
    }

    pub(crate) fn activate(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.enabled = true;
    }

    pub(crate) fn stop(&mut self) {
        self.idle();
        self.stopped = true;
    }

    /// Interval to arm, only while active
    pub(crate) fn interval(&self) -> Option<Duration> {
        if self.enabled && !self.stopped {
            self.interval
        } else {
            None
        }
    }

    /// Sequence number for the next notification; advances the counter
    pub(crate) fn next_sequence(&mut self) -> u64 {
        let current = self.sequence;
        self.sequence += 1;
        current
    }

    pub(crate) fn phase(&self) -> SchedulerPhase {
        match (self.stopped, self.interval()) {
            (true, _) => SchedulerPhase::Stopped,
            (false, Some(interval)) => SchedulerPhase::Active { interval },
            (false, None) => SchedulerPhase::Idle,
        }
    }

    pub(crate) fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            phase: self.phase(),
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_SECONDS: Duration = Duration::from_secs(10);

    #[test]
    fn test_new_state_is_idle() {
        let state = SchedulerState::new();
        assert_eq!(state.phase(), SchedulerPhase::Idle);
        assert_eq!(state.interval(), None);
        assert_eq!(state.status().sequence, 0);
    }

    #[test]
    fn test_activate_and_back_to_idle() {
        let mut state = SchedulerState::new();
        state.activate(TEN_SECONDS);
        assert_eq!(
            state.phase(),
            SchedulerPhase::Active {
                interval: TEN_SECONDS
            }
        );

        state.idle();
        assert_eq!(state.phase(), SchedulerPhase::Idle);
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut state = SchedulerState::new();
        state.activate(TEN_SECONDS);
        state.stop();
        assert_eq!(state.phase(), SchedulerPhase::Stopped);
        assert_eq!(state.interval(), None);

        state.activate(TEN_SECONDS);
        assert_eq!(state.phase(), SchedulerPhase::Stopped);
        assert_eq!(state.interval(), None);
    }

    #[test]
    fn test_sequence_increments_by_one() {
        let mut state = SchedulerState::new();
        assert_eq!(state.next_sequence(), 0);
        assert_eq!(state.next_sequence(), 1);
        assert_eq!(state.next_sequence(), 2);
        assert_eq!(state.status().sequence, 3);
    }

    #[test]
    fn test_sequence_survives_interval_changes() {
        let mut state = SchedulerState::new();
        state.activate(TEN_SECONDS);
        state.next_sequence();
        state.activate(Duration::from_secs(60));
        assert_eq!(state.next_sequence(), 1);
    }
}
