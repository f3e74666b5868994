//! Passthrough to the third-party weather provider.

pub mod handlers;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::WeatherConfig;
use crate::error::{AppError, ProxyError};
use crate::Result;

pub struct WeatherClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
        })
    }

    /// Fetches current conditions for `city` and returns the provider's JSON
    /// untouched.
    pub async fn current(&self, city: &str) -> Result<Value> {
        let api_key = self.api_key.as_deref().ok_or(ProxyError::MissingApiKey)?;

        debug!("Requesting current weather for {}", city);
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("key", api_key), ("q", city)])
            .send()
            .await
            .map_err(|e| {
                error!("Weather API request failed: {}", e);
                ProxyError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        if status.is_success() {
            return body.ok_or_else(|| {
                ProxyError::RequestFailed("provider returned a non-JSON body".to_string()).into()
            });
        }

        // Provider errors look like {"error": {"message": ..., "code": ...}}
        match body.as_ref().and_then(|b| b.get("error")) {
            Some(err) => Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unable to fetch weather data.")
                    .to_string(),
                code: err.get("code").and_then(Value::as_i64),
            }
            .into()),
            None => {
                error!("Weather API returned {} without an error body", status);
                Err(ProxyError::RequestFailed(format!("provider returned {}", status)).into())
            }
        }
    }
}
