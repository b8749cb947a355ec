use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::weather::models::default_icon_base_url;
use crate::weather::OPENWEATHERMAP_API_URL;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// OpenWeatherMap API key
    #[serde(default)]
    pub openweathermap_api_key: String,

    /// Default city for weather queries
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Base URL of the OpenWeatherMap 2.5 API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL weather icons are served from
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    /// Path of the persisted settings file
    #[serde(default = "default_settings_path")]
    pub settings_path: String,

    /// Prometheus exporter listen address (disabled when unset)
    #[serde(default)]
    pub metrics_addr: Option<String>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub ticker: TickerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub ntfy: Option<NtfyConfig>,

    #[serde(default)]
    pub gotify: Option<GotifyConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NtfyConfig {
    pub url: String,
    pub topic: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GotifyConfig {
    pub url: String,
    pub token: String,
}

/// Content of the periodic tick notification
#[derive(Debug, Deserialize, Clone)]
pub struct TickerConfig {
    #[serde(default = "default_ticker_title")]
    pub title: String,

    /// Body is "{body_prefix} {sequence}"
    #[serde(default = "default_body_prefix")]
    pub body_prefix: String,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            title: default_ticker_title(),
            body_prefix: default_body_prefix(),
        }
    }
}

fn default_city() -> String {
    "London".to_string()
}

fn default_api_base_url() -> String {
    OPENWEATHERMAP_API_URL.to_string()
}

fn default_settings_path() -> String {
    "data/settings.json".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_ticker_title() -> String {
    "Popup Service".to_string()
}

fn default_body_prefix() -> String {
    "Hello World".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .set_default("default_city", default_city())?
            .set_default("api_base_url", default_api_base_url())?
            .set_default("settings_path", default_settings_path())?
            // Load from config file if present
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config.local").required(false))
            // Override with environment variables (prefixed with NIMBUS_)
            // Convert SCREAMING_SNAKE_CASE env vars to snake_case config keys
            .add_source(
                Environment::with_prefix("NIMBUS")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(Case::Snake)
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_toml(r#"openweathermap_api_key = "abc""#);

        assert_eq!(config.openweathermap_api_key, "abc");
        assert_eq!(config.default_city, "London");
        assert_eq!(config.api_base_url, OPENWEATHERMAP_API_URL);
        assert_eq!(config.icon_base_url, "https://openweathermap.org/img/wn");
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.notifications.ntfy.is_none());
        assert!(config.metrics_addr.is_none());
        assert_eq!(config.ticker.body_prefix, "Hello World");
    }

    #[test]
    fn test_nested_sections() {
        let config = from_toml(
            r#"
            default_city = "Chicago"

            [http]
            timeout_secs = 10

            [notifications.ntfy]
            url = "https://ntfy.sh"
            topic = "weather"
            token = "tk_123"

            [ticker]
            title = "Ticker"
            "#,
        );

        assert_eq!(config.default_city, "Chicago");
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.connect_timeout_secs, 5);
        let ntfy = config.notifications.ntfy.expect("ntfy should be configured");
        assert_eq!(ntfy.topic, "weather");
        assert_eq!(ntfy.token.as_deref(), Some("tk_123"));
        assert_eq!(config.ticker.title, "Ticker");
        assert_eq!(config.ticker.body_prefix, "Hello World");
    }
}
