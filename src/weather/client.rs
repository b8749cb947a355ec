use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::models::*;
use crate::config::HttpConfig;

pub const OPENWEATHERMAP_API_URL: &str = "https://api.openweathermap.org/data/2.5";
/// Units are fixed; every published temperature is Celsius
const UNITS: &str = "metric";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Failed to fetch weather data: {0}")]
    Request(#[from] reqwest::Error),

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

impl WeatherError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(e) => e.status(),
            Self::CityNotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::Api { status, .. } => Some(*status),
            Self::InvalidResponse(_) => None,
        }
    }
}

/// Source of weather data consumed by the store.
///
/// Failures never surface here: implementations log them and return `None`.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_current(&self, location: &str, api_key: &str) -> Option<WeatherSnapshot>;

    async fn fetch_forecast(&self, location: &str, api_key: &str) -> Option<ForecastList>;
}

/// Create shared HTTP client with connection pooling
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(10)
        .build()
}

/// Client for the OpenWeatherMap current weather and 5 day forecast endpoints
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn try_fetch_current(
        &self,
        location: &str,
        api_key: &str,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let data: CurrentWeatherResponse = self.get("weather", location, api_key).await?;
        let snapshot = WeatherSnapshot::from(data);

        tracing::info!(
            city = %snapshot.location,
            temp = %snapshot.temperature,
            "Weather data fetched successfully"
        );

        Ok(snapshot)
    }

    pub async fn try_fetch_forecast(
        &self,
        location: &str,
        api_key: &str,
    ) -> Result<ForecastList, WeatherError> {
        let data: ForecastResponse = self.get("forecast", location, api_key).await?;
        let list: ForecastList = data.list.into_iter().map(ForecastEntry::from).collect();

        tracing::info!(city = %location, entries = list.len(), "Forecast fetched successfully");

        Ok(list)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &str,
        api_key: &str,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(city = %location, endpoint = %endpoint, "Fetching from OpenWeatherMap");

        // Use query builder for proper URL encoding - handles spaces and special chars
        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("appid", api_key), ("units", UNITS)])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "Received API response");

        if status == StatusCode::NOT_FOUND {
            return Err(WeatherError::CityNotFound(location.to_string()));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(WeatherError::Api { status, message });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn collapse<T>(kind: &'static str, location: &str, result: Result<T, WeatherError>) -> Option<T> {
    match result {
        Ok(value) => {
            metrics::counter!("nimbus_fetch_total", "kind" => kind, "outcome" => "ok").increment(1);
            Some(value)
        }
        Err(e) => {
            metrics::counter!("nimbus_fetch_total", "kind" => kind, "outcome" => "error")
                .increment(1);
            tracing::error!(
                kind = kind,
                city = %location,
                status = ?e.status().map(|s| s.as_u16()),
                error = %e,
                "Failed to fetch from OpenWeatherMap"
            );
            None
        }
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_current(&self, location: &str, api_key: &str) -> Option<WeatherSnapshot> {
        collapse(
            "current",
            location,
            self.try_fetch_current(location, api_key).await,
        )
    }

    async fn fetch_forecast(&self, location: &str, api_key: &str) -> Option<ForecastList> {
        collapse(
            "forecast",
            location,
            self.try_fetch_forecast(location, api_key).await,
        )
    }
}
