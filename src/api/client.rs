//! REST client for the timesheet API.
//!
//! Every request carries the static API key and a JSON content type. There is
//! no retry, timeout or backoff: failures go straight back to the caller.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameters. `None` values are dropped before the request is sent.
pub type Params<'a> = &'a [(&'a str, Option<String>)];

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute endpoints pass through; relative ones are joined to the base
    /// with a single slash.
    pub fn build_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    #[instrument(skip(self, params), fields(endpoint = %endpoint))]
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: Params<'_>) -> Result<T, ApiError> {
        let url = self.build_url(endpoint);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();
        debug!(url = %url, ?query, "GET request");
        let response = self.request(Method::GET, &url).query(&query).send().await?;
        Self::decode(response, &url).await
    }

    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.build_url(endpoint);
        debug!(url = %url, "POST request");
        let response = self.request(Method::POST, &url).json(body).send().await?;
        Self::decode(response, &url).await
    }

    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.build_url(endpoint);
        debug!(url = %url, "PUT request");
        let response = self.request(Method::PUT, &url).json(body).send().await?;
        Self::decode(response, &url).await
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let url = self.build_url(endpoint);
        debug!(url = %url, "DELETE request");
        let response = self.request(Method::DELETE, &url).send().await?;
        Self::decode(response, &url).await
    }

    /// Empty bodies (and 204/205) decode as JSON `null`.
    pub(crate) async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, url, body));
        }
        let no_content = status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT;
        let bytes = response.bytes().await?;
        let parsed = if no_content || bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        };
        parsed.map_err(|e| ApiError::Client(format!("Failed to parse response from {}: {}", url, e)))
    }
}
