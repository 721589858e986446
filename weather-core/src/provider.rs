use crate::{config::ApiConfig, error::EtlError, provider::openweather::OpenWeatherProvider};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Upstream source of raw weather observations.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// One readiness request. `Ok(true)` only on HTTP 200.
    async fn probe(&self) -> Result<bool, EtlError>;

    /// Fetch the current observation as an untyped JSON document.
    async fn fetch_current(&self) -> Result<Value, EtlError>;
}

/// Construct the weather provider from config.
pub fn provider_from_config(config: &ApiConfig) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    if config.api_key.trim().is_empty() {
        anyhow::bail!(
            "No OpenWeather API key configured.\n\
             Hint: run `weather-etl configure` and enter your API key."
        );
    }

    let provider = OpenWeatherProvider::new(
        config.base_url.clone(),
        config.city.clone(),
        config.api_key.clone(),
        config.request_timeout(),
    )
    .context("Failed to build HTTP client for OpenWeather")?;

    Ok(Arc::new(provider))
}
