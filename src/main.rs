use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nimbus::config::AppConfig;
use nimbus::notifications::NotificationService;
use nimbus::scheduler::{NotificationScheduler, SchedulerPhase};
use nimbus::settings::{FileStore, SettingsChannel, TimerOption};
use nimbus::shell::{self, Shell};
use nimbus::store::WeatherStore;
use nimbus::weather::{build_http_client, WeatherClient};

#[derive(Parser)]
#[command(name = "nimbus", version, about = "Weather lookups and a periodic notifier")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive shell (default)
    Shell,
    /// Print current weather for a city
    Weather { city: Option<String> },
    /// Print the 5 day forecast for a city
    Forecast { city: Option<String> },
    /// Persist the tick interval (Deactivated, 10s, 30s, 60s, 30 min, 60 min)
    Timer { option: String },
    /// Run the notifier until interrupted
    Run,
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping notifier");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nimbus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded successfully");

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid metrics address: {}", addr))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        tracing::info!(%addr, "Metrics exporter listening");
    }

    if config.openweathermap_api_key.is_empty() {
        tracing::warn!("No OpenWeatherMap API key configured; weather requests will fail");
    }

    // Shared HTTP client with connection pooling
    let http_client =
        build_http_client(&config.http).context("Failed to create HTTP client")?;
    tracing::debug!("Shared HTTP client created");

    let weather_client = WeatherClient::new(http_client.clone(), &config.api_base_url);
    let store = WeatherStore::new(Arc::new(weather_client), &config.icon_base_url);

    let settings = SettingsChannel::new(Arc::new(FileStore::new(&config.settings_path)));

    let notifications = Arc::new(NotificationService::from_config(
        http_client,
        &config.notifications,
    ));
    if notifications.is_configured() {
        tracing::info!("Notification service configured");
    } else {
        tracing::info!("No notification services configured; ticks will be skipped");
    }

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            Shell::new(config, store, settings, notifications)
                .run()
                .await?;
        }
        Command::Weather { city } => {
            let city = city.unwrap_or_else(|| config.default_city.clone());
            store
                .request_current_weather(&city, &config.openweathermap_api_key)
                .await?;
            println!("{}", shell::render_current(&store));
        }
        Command::Forecast { city } => {
            let city = city.unwrap_or_else(|| config.default_city.clone());
            store
                .request_forecast(&city, &config.openweathermap_api_key)
                .await?;
            println!("{}", shell::render_forecast(&store));
        }
        Command::Timer { option } => {
            let option = TimerOption::from_label(&option);
            settings.write_timer_option(option).await?;
            println!("Timer set to {}", option);
        }
        Command::Run => {
            let scheduler = NotificationScheduler::spawn(&settings, notifications, config.ticker);
            let mut status = scheduler.subscribe_status();

            tokio::select! {
                _ = shutdown_signal() => {
                    if let Err(e) = scheduler.stop().await {
                        tracing::debug!(error = %e, "Notifier already stopped");
                    }
                }
                _ = status.wait_for(|s| s.phase == SchedulerPhase::Stopped) => {
                    tracing::info!("Notifier stopped on its own");
                }
            }

            scheduler.join().await?;
        }
    }

    Ok(())
}
