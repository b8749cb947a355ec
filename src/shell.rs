use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::AppConfig;
use crate::notifications::NotificationService;
use crate::scheduler::{NotificationScheduler, SchedulerHandle, SchedulerPhase};
use crate::settings::{SettingsChannel, TimerOption};
use crate::store::WeatherStore;
use crate::weather::{ForecastEntry, WeatherSnapshot};

const HELP: &str = "\
Commands:
  weather [city]    fetch current weather
  forecast [city]   fetch the 5 day forecast
  show              print the last fetched state
  timer <option>    set the tick interval (Deactivated, 10s, 30s, 60s, 30 min, 60 min)
  timers            list timer options
  status            print notifier status
  restart           re-arm the pending tick
  mute | unmute     revoke or grant notification permission
  help              this text
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Weather(Option<String>),
    Forecast(Option<String>),
    Show,
    Timer(TimerOption),
    Timers,
    Status,
    Restart,
    Mute(bool),
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let command = match verb.to_ascii_lowercase().as_str() {
            "weather" | "w" => ShellCommand::Weather(arg),
            "forecast" | "f" => ShellCommand::Forecast(arg),
            "show" => ShellCommand::Show,
            "timer" => match arg {
                Some(label) => ShellCommand::Timer(TimerOption::from_label(&label)),
                None => return Err("usage: timer <option>".to_string()),
            },
            "timers" => ShellCommand::Timers,
            "status" => ShellCommand::Status,
            "restart" => ShellCommand::Restart,
            "mute" => ShellCommand::Mute(true),
            "unmute" => ShellCommand::Mute(false),
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => return Err(format!("unknown command: {} (try 'help')", other)),
        };

        Ok(Some(command))
    }
}

/// Interactive terminal front end over the store and the notifier
pub struct Shell {
    config: AppConfig,
    store: WeatherStore,
    settings: SettingsChannel,
    notifications: Arc<NotificationService>,
    scheduler: Option<SchedulerHandle>,
}

impl Shell {
    pub fn new(
        config: AppConfig,
        store: WeatherStore,
        settings: SettingsChannel,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            config,
            store,
            settings,
            notifications,
            scheduler: None,
        }
    }

    /// Read commands from stdin until `quit` or end of input
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.ensure_scheduler();
        println!("nimbus - type 'help' for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match ShellCommand::parse(&line) {
                Ok(Some(ShellCommand::Quit)) => break,
                Ok(Some(command)) => {
                    let output = self.execute(command).await;
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                }
                Ok(None) => {}
                Err(message) => println!("{}", message),
            }
        }

        if let Some(scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.stop().await {
                tracing::debug!(error = %e, "Notifier already stopped");
            }
            scheduler.join().await?;
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: ShellCommand) -> String {
        match command {
            ShellCommand::Weather(city) => {
                let city = city.unwrap_or_else(|| self.config.default_city.clone());
                if let Err(e) = self
                    .store
                    .request_current_weather(&city, &self.config.openweathermap_api_key)
                    .await
                {
                    tracing::error!(error = %e, "Weather request task failed");
                }
                render_current(&self.store)
            }
            ShellCommand::Forecast(city) => {
                let city = city.unwrap_or_else(|| self.config.default_city.clone());
                if let Err(e) = self
                    .store
                    .request_forecast(&city, &self.config.openweathermap_api_key)
                    .await
                {
                    tracing::error!(error = %e, "Forecast request task failed");
                }
                render_forecast(&self.store)
            }
            ShellCommand::Show => {
                format!("{}\n{}", render_current(&self.store), render_forecast(&self.store))
            }
            ShellCommand::Timer(option) => {
                if let Err(e) = self.settings.write_timer_option(option).await {
                    return format!("Failed to save timer option: {}", e);
                }
                if option.is_disabled() {
                    self.wait_for_stop().await;
                } else {
                    self.ensure_scheduler();
                }
                format!("Timer set to {}", option)
            }
            ShellCommand::Timers => TimerOption::ALL
                .iter()
                .map(|o| o.label())
                .collect::<Vec<_>>()
                .join(", "),
            ShellCommand::Status => self.render_status(),
            ShellCommand::Restart => match &self.scheduler {
                Some(scheduler) if !scheduler.is_finished() => match scheduler.restart().await {
                    Ok(()) => "Tick re-armed".to_string(),
                    Err(e) => e.to_string(),
                },
                _ => "Notifier is not running".to_string(),
            },
            ShellCommand::Mute(muted) => {
                self.notifications.set_muted(muted);
                if muted {
                    "Notifications muted".to_string()
                } else {
                    "Notifications unmuted".to_string()
                }
            }
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Quit => String::new(),
        }
    }

    /// Start a notifier unless one is already running
    fn ensure_scheduler(&mut self) {
        let running = self.scheduler.as_ref().is_some_and(|scheduler| {
            !scheduler.is_finished() && scheduler.status().phase != SchedulerPhase::Stopped
        });
        if running {
            return;
        }

        self.scheduler = Some(NotificationScheduler::spawn(
            &self.settings,
            self.notifications.clone(),
            self.config.ticker.clone(),
        ));
    }

    /// A disabling write ends the notifier; wait until it has wound down
    async fn wait_for_stop(&self) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        let mut status = scheduler.subscribe_status();
        if status
            .wait_for(|s| s.phase == SchedulerPhase::Stopped)
            .await
            .is_err()
        {
            tracing::debug!("Notifier exited without a final status");
        }
    }

    fn render_status(&self) -> String {
        let Some(scheduler) = &self.scheduler else {
            return "Notifier: not started".to_string();
        };
        let status = scheduler.status();
        let phase = match status.phase {
            SchedulerPhase::Stopped => "stopped".to_string(),
            SchedulerPhase::Idle => "idle".to_string(),
            SchedulerPhase::Active { interval } => {
                format!("active, every {}s", interval.as_secs())
            }
        };
        format!(
            "Notifier: {} (sent {}, muted {})",
            phase,
            status.sequence,
            self.notifications.is_muted()
        )
    }
}

pub fn render_current(store: &WeatherStore) -> String {
    let mut out = match store.current_weather() {
        Some(snapshot) => format_snapshot(&snapshot),
        None => "No weather data yet".to_string(),
    };
    if let Some(icon) = store.icon_url() {
        let _ = write!(out, "\nIcon: {}", icon);
    }
    if let Some(error) = store.error_message() {
        let _ = write!(out, "\nError: {}", error);
    }
    out
}

pub fn render_forecast(store: &WeatherStore) -> String {
    let forecast = store.forecast();
    let mut out = if forecast.is_empty() {
        "No forecast data yet".to_string()
    } else {
        forecast
            .iter()
            .map(format_entry)
            .collect::<Vec<_>>()
            .join("\n")
    };
    if let Some(error) = store.error_message() {
        let _ = write!(out, "\nError: {}", error);
    }
    out
}

fn format_snapshot(snapshot: &WeatherSnapshot) -> String {
    let place = match &snapshot.country {
        Some(country) => format!("{}, {}", snapshot.location, country),
        None => snapshot.location.clone(),
    };
    format!(
        "{}: {:.1}°C (feels {:.1}°C), {}, humidity {}%\nObserved {}",
        place,
        snapshot.temperature,
        snapshot.feels_like,
        snapshot.description,
        snapshot.humidity,
        snapshot.observed_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn format_entry(entry: &ForecastEntry) -> String {
    let description = if entry.description.is_empty() {
        "N/A"
    } else {
        entry.description.as_str()
    };
    format!(
        "{}  {:.1}°C - {}",
        entry.timestamp.format("%a %d %H:%M"),
        entry.temperature,
        description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;
    use crate::weather::{ForecastList, WeatherSource};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("  "), Ok(None));
        assert_eq!(
            ShellCommand::parse("weather"),
            Ok(Some(ShellCommand::Weather(None)))
        );
        assert_eq!(
            ShellCommand::parse("weather  New York "),
            Ok(Some(ShellCommand::Weather(Some("New York".to_string()))))
        );
        assert_eq!(
            ShellCommand::parse("f Paris"),
            Ok(Some(ShellCommand::Forecast(Some("Paris".to_string()))))
        );
        assert_eq!(
            ShellCommand::parse("timer 30 min"),
            Ok(Some(ShellCommand::Timer(TimerOption::ThirtyMinutes)))
        );
        assert_eq!(
            ShellCommand::parse("timer nonsense"),
            Ok(Some(ShellCommand::Timer(TimerOption::Disabled)))
        );
        assert_eq!(ShellCommand::parse("MUTE"), Ok(Some(ShellCommand::Mute(true))));
        assert_eq!(ShellCommand::parse("exit"), Ok(Some(ShellCommand::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ShellCommand::parse("timer").is_err());
        assert!(ShellCommand::parse("dance").is_err());
    }

    struct StaticSource;

    #[async_trait]
    impl WeatherSource for StaticSource {
        async fn fetch_current(&self, location: &str, _api_key: &str) -> Option<WeatherSnapshot> {
            (location != "Atlantis").then(|| WeatherSnapshot {
                location: location.to_string(),
                country: Some("NO".to_string()),
                temperature: -3.25,
                feels_like: -8.0,
                humidity: 81,
                description: "light snow".to_string(),
                icon: "13d".to_string(),
                observed_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
            })
        }

        async fn fetch_forecast(&self, _location: &str, _api_key: &str) -> Option<ForecastList> {
            Some(vec![ForecastEntry {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                temperature: -1.0,
                temp_min: -2.0,
                temp_max: 0.0,
                humidity: 75,
                precipitation_probability: 0.3,
                description: String::new(),
                icon: "13d".to_string(),
            }])
        }
    }

    fn shell() -> Shell {
        let config: AppConfig = ::config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        Shell::new(
            config,
            WeatherStore::new(Arc::new(StaticSource), "https://openweathermap.org/img/wn"),
            SettingsChannel::new(Arc::new(MemoryStore::new())),
            Arc::new(NotificationService::new(None, None)),
        )
    }

    #[tokio::test]
    async fn test_weather_command_renders_snapshot() {
        let mut shell = shell();
        let output = shell
            .execute(ShellCommand::Weather(Some("Tromso".to_string())))
            .await;

        assert!(output.contains("Tromso, NO: -3.2°C"), "{output}");
        assert!(output.contains("light snow"));
        assert!(output.contains("Observed 2024-01-15 09:30 UTC"));
        assert!(output.contains("Icon: https://openweathermap.org/img/wn/13d@2x.png"));
        assert!(!output.contains("Error"));
    }

    #[tokio::test]
    async fn test_failed_weather_shows_stale_data_and_error() {
        let mut shell = shell();
        shell
            .execute(ShellCommand::Weather(Some("Tromso".to_string())))
            .await;
        let output = shell
            .execute(ShellCommand::Weather(Some("Atlantis".to_string())))
            .await;

        assert!(output.contains("Tromso"));
        assert!(output.contains("Error: Failed to fetch weather"));
    }

    #[tokio::test]
    async fn test_forecast_command_renders_entries() {
        let mut shell = shell();
        let output = shell.execute(ShellCommand::Forecast(None)).await;

        assert_eq!(output, "Mon 15 12:00  -1.0°C - N/A");
    }

    #[tokio::test]
    async fn test_timer_command_starts_notifier() {
        let mut shell = shell();
        assert_eq!(
            shell.execute(ShellCommand::Status).await,
            "Notifier: not started"
        );

        let output = shell
            .execute(ShellCommand::Timer(TimerOption::SixtyMinutes))
            .await;
        assert_eq!(output, "Timer set to 60 min");
        assert_eq!(
            shell.settings.read_timer_option().await.unwrap(),
            TimerOption::SixtyMinutes
        );

        // Let the notifier read the setting
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(shell
            .execute(ShellCommand::Status)
            .await
            .starts_with("Notifier: active, every 3600s"));
    }

    #[tokio::test]
    async fn test_disable_then_enable_back_to_back_restarts_notifier() {
        let mut shell = shell();
        shell
            .execute(ShellCommand::Timer(TimerOption::TenSeconds))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        shell
            .execute(ShellCommand::Timer(TimerOption::Disabled))
            .await;
        shell
            .execute(ShellCommand::Timer(TimerOption::ThirtySeconds))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(
            shell.settings.read_timer_option().await.unwrap(),
            TimerOption::ThirtySeconds
        );
        let status = shell.execute(ShellCommand::Status).await;
        assert!(status.starts_with("Notifier: active, every 30s"), "{status}");
    }

    #[tokio::test]
    async fn test_mute_toggles_permission() {
        let mut shell = shell();
        shell.execute(ShellCommand::Mute(true)).await;
        assert!(shell.notifications.is_muted());
        shell.execute(ShellCommand::Mute(false)).await;
        assert!(!shell.notifications.is_muted());
    }
}
