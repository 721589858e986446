use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::error::EtlError;

use super::WeatherProvider;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

/// Upper bound for a single request, connect through body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct OpenWeatherProvider {
    base_url: String,
    city: String,
    api_key: String,
    http: Client,
}

impl std::fmt::Debug for OpenWeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherProvider")
            .field("base_url", &self.base_url)
            .field("city", &self.city)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherProvider {
    pub fn new(
        base_url: String,
        city: String,
        api_key: String,
        request_timeout: Duration,
    ) -> Result<Self, EtlError> {
        let http = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            city,
            api_key,
            http,
        })
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    async fn get(&self) -> Result<reqwest::Response, EtlError> {
        let url = format!("{}{}", self.base_url, CURRENT_WEATHER_PATH);

        // `appid` rides in the query string; reqwest errors carry the URL, so strip it.
        self.http
            .get(url)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EtlError::Http(e.without_url()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn probe(&self) -> Result<bool, EtlError> {
        let status = self.get().await?.status();
        tracing::debug!(city = %self.city, %status, "readiness probe");
        Ok(status == StatusCode::OK)
    }

    async fn fetch_current(&self) -> Result<Value, EtlError> {
        let res = self.get().await?;

        let status = res.status();
        let body = res.text().await.map_err(|e| EtlError::Http(e.without_url()))?;

        if !status.is_success() {
            return Err(EtlError::UpstreamStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        tracing::info!(city = %self.city, bytes = body.len(), "fetched current weather");

        serde_json::from_str(&body)
            .map_err(|e| EtlError::malformed(format!("response body is not valid JSON: {e}")))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("not found"), "not found");
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let body = "é".repeat(300);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn debug_does_not_leak_api_key() {
        let provider = OpenWeatherProvider::new(
            "https://api.openweathermap.org/".into(),
            "Pune".into(),
            "SECRET_APPID".into(),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        let dump = format!("{provider:?}");
        assert!(!dump.contains("SECRET_APPID"));
        assert!(dump.contains("Pune"));
        assert!(dump.contains("\"https://api.openweathermap.org\""));
    }
}
