use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

// ============================================================================
// OpenWeatherMap 2.5 Responses (Internal)
// These structs deserialize the raw API response; not all fields are used
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CurrentWeatherResponse {
    pub name: String,
    pub dt: i64,
    #[serde(default)]
    pub sys: Option<SysInfo>,
    pub main: MainInfo,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
pub struct SysInfo {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MainInfo {
    pub temp: f64,
    pub feels_like: f64,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    pub humidity: u32,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherCondition {
    pub id: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastItem {
    pub dt: i64,
    pub main: MainInfo,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    /// Probability of precipitation
    #[serde(default)]
    pub pop: f64,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}

// ============================================================================
// Published Models (External - what the store exposes to observers)
// ============================================================================

/// Current conditions for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u32,
    pub description: String,
    pub icon: String,
    pub observed_at: DateTime<Utc>,
}

/// One forecast data point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
    pub precipitation_probability: f64,
    pub description: String,
    pub icon: String,
}

/// Forecast entries in the chronological order the API returned them
pub type ForecastList = Vec<ForecastEntry>;

fn from_unix(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

impl From<CurrentWeatherResponse> for WeatherSnapshot {
    fn from(data: CurrentWeatherResponse) -> Self {
        let weather = data.weather.first();
        Self {
            location: data.name,
            country: data.sys.and_then(|s| s.country),
            temperature: data.main.temp,
            feels_like: data.main.feels_like,
            humidity: data.main.humidity,
            description: weather.map(|w| w.description.clone()).unwrap_or_default(),
            icon: weather.map(|w| w.icon.clone()).unwrap_or_default(),
            observed_at: from_unix(data.dt),
        }
    }
}

impl From<ForecastItem> for ForecastEntry {
    fn from(item: ForecastItem) -> Self {
        let weather = item.weather.first();
        Self {
            timestamp: from_unix(item.dt),
            temperature: item.main.temp,
            temp_min: item.main.temp_min.unwrap_or(item.main.temp),
            temp_max: item.main.temp_max.unwrap_or(item.main.temp),
            humidity: item.main.humidity,
            precipitation_probability: item.pop,
            description: weather.map(|w| w.description.clone()).unwrap_or_default(),
            icon: weather.map(|w| w.icon.clone()).unwrap_or_default(),
        }
    }
}

/// Build the icon URL for an icon identifier such as "01d".
/// Returns None for an empty identifier.
pub fn icon_url(base: &str, icon: &str) -> Option<String> {
    let icon = icon.trim();
    if icon.is_empty() {
        return None;
    }
    Some(format!("{}/{}@2x.png", base.trim_end_matches('/'), icon))
}

pub fn default_icon_base_url() -> String {
    DEFAULT_ICON_BASE_URL.to_string()
}
