use std::any::Any;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::weather::{icon_url, ForecastList, WeatherSnapshot, WeatherSource};

const CURRENT_FAILED: &str = "Failed to fetch weather. Please check your API key or city name.";
const FORECAST_FAILED: &str = "Failed to fetch forecast. Please check your API key or city name.";

/// Observable weather state fed by a [`WeatherSource`].
///
/// Each cell is a `watch` channel: observers get the latest value and are
/// woken on every replacement. Failed fetches only touch `error_message`,
/// so stale data stays visible next to the failure notice.
#[derive(Clone)]
pub struct WeatherStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    source: Arc<dyn WeatherSource>,
    icon_base_url: String,
    current_weather: watch::Sender<Option<WeatherSnapshot>>,
    forecast: watch::Sender<ForecastList>,
    icon_url: watch::Sender<Option<String>>,
    error_message: watch::Sender<Option<String>>,
}

impl WeatherStore {
    pub fn new(source: Arc<dyn WeatherSource>, icon_base_url: &str) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                source,
                icon_base_url: icon_base_url.to_string(),
                current_weather: watch::Sender::new(None),
                forecast: watch::Sender::new(Vec::new()),
                icon_url: watch::Sender::new(None),
                error_message: watch::Sender::new(None),
            }),
        }
    }

    /// Fetch current weather in the background.
    ///
    /// Duplicate requests are not coalesced; whichever finishes last wins.
    pub fn request_current_weather(&self, location: &str, api_key: &str) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let source = Arc::clone(&inner.source);
        let location = location.to_string();
        let api_key = api_key.to_string();

        tokio::spawn(async move {
            let fetch =
                tokio::spawn(async move { source.fetch_current(&location, &api_key).await });

            match fetch.await {
                Ok(Some(snapshot)) => {
                    let icon = icon_url(&inner.icon_base_url, &snapshot.icon);
                    inner.current_weather.send_replace(Some(snapshot));
                    inner.icon_url.send_replace(icon);
                    inner.error_message.send_replace(None);
                }
                Ok(None) => {
                    inner
                        .error_message
                        .send_replace(Some(CURRENT_FAILED.to_string()));
                }
                Err(e) => inner.record_fault(e),
            }
        })
    }

    /// Fetch the forecast in the background. Same contract as
    /// [`WeatherStore::request_current_weather`].
    pub fn request_forecast(&self, location: &str, api_key: &str) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let source = Arc::clone(&inner.source);
        let location = location.to_string();
        let api_key = api_key.to_string();

        tokio::spawn(async move {
            let fetch =
                tokio::spawn(async move { source.fetch_forecast(&location, &api_key).await });

            match fetch.await {
                Ok(Some(list)) => {
                    inner.forecast.send_replace(list);
                    inner.error_message.send_replace(None);
                }
                Ok(None) => {
                    inner
                        .error_message
                        .send_replace(Some(FORECAST_FAILED.to_string()));
                }
                Err(e) => inner.record_fault(e),
            }
        })
    }

    pub fn current_weather(&self) -> Option<WeatherSnapshot> {
        self.inner.current_weather.borrow().clone()
    }

    pub fn forecast(&self) -> ForecastList {
        self.inner.forecast.borrow().clone()
    }

    pub fn icon_url(&self) -> Option<String> {
        self.inner.icon_url.borrow().clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.error_message.borrow().clone()
    }

    pub fn subscribe_current_weather(&self) -> watch::Receiver<Option<WeatherSnapshot>> {
        self.inner.current_weather.subscribe()
    }

    pub fn subscribe_forecast(&self) -> watch::Receiver<ForecastList> {
        self.inner.forecast.subscribe()
    }

    pub fn subscribe_icon_url(&self) -> watch::Receiver<Option<String>> {
        self.inner.icon_url.subscribe()
    }

    pub fn subscribe_error_message(&self) -> watch::Receiver<Option<String>> {
        self.inner.error_message.subscribe()
    }
}

impl StoreInner {
    fn record_fault(&self, err: JoinError) {
        let description = if err.is_panic() {
            panic_message(err.into_panic())
        } else {
            err.to_string()
        };

        tracing::error!(error = %description, "Unexpected fault while fetching weather");
        self.error_message
            .send_replace(Some(format!("An error occurred: {}", description)));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
