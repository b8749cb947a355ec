mod client;
pub mod models;

pub use client::{build_http_client, WeatherClient, WeatherError, WeatherSource, OPENWEATHERMAP_API_URL};
pub use models::{icon_url, ForecastEntry, ForecastList, WeatherSnapshot};
