use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How often the tick notifier fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimerOption {
    #[default]
    Disabled,
    TenSeconds,
    ThirtySeconds,
    SixtySeconds,
    ThirtyMinutes,
    SixtyMinutes,
}

impl TimerOption {
    pub const ALL: [TimerOption; 6] = [
        TimerOption::Disabled,
        TimerOption::TenSeconds,
        TimerOption::ThirtySeconds,
        TimerOption::SixtySeconds,
        TimerOption::ThirtyMinutes,
        TimerOption::SixtyMinutes,
    ];

    /// Label shown in the settings UI and stored in the settings file
    pub fn label(self) -> &'static str {
        match self {
            TimerOption::Disabled => "Deactivated",
            TimerOption::TenSeconds => "10s",
            TimerOption::ThirtySeconds => "30s",
            TimerOption::SixtySeconds => "60s",
            TimerOption::ThirtyMinutes => "30 min",
            TimerOption::SixtyMinutes => "60 min",
        }
    }

    /// Parse a label. Unknown labels mean "disabled" so the mapping stays total.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "10s" => TimerOption::TenSeconds,
            "30s" => TimerOption::ThirtySeconds,
            "60s" => TimerOption::SixtySeconds,
            "30 min" | "30 minutes" => TimerOption::ThirtyMinutes,
            "60 min" | "60 minutes" => TimerOption::SixtyMinutes,
            _ => TimerOption::Disabled,
        }
    }

    /// Tick interval, or None for the disabled sentinel
    pub fn interval(self) -> Option<Duration> {
        match self {
            TimerOption::Disabled => None,
            TimerOption::TenSeconds => Some(Duration::from_secs(10)),
            TimerOption::ThirtySeconds => Some(Duration::from_secs(30)),
            TimerOption::SixtySeconds => Some(Duration::from_secs(60)),
            TimerOption::ThirtyMinutes => Some(Duration::from_secs(30 * 60)),
            TimerOption::SixtyMinutes => Some(Duration::from_secs(60 * 60)),
        }
    }

    pub fn is_disabled(self) -> bool {
        self.interval().is_none()
    }
}

impl fmt::Display for TimerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for TimerOption {
    fn from(label: String) -> Self {
        TimerOption::from_label(&label)
    }
}

impl From<TimerOption> for String {
    fn from(option: TimerOption) -> Self {
        option.label().to_string()
    }
}
