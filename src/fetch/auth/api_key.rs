use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

/// Header the fleet backend reads its API key from.
pub const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("invalid API key header name: {0}")]
    Name(#[from] InvalidHeaderName),
    #[error("API key is not a valid header value")]
    Value(#[from] InvalidHeaderValue),
}

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header on
/// every request.
///
/// Header name and value are validated once at construction, so sending can
/// never fail on a malformed key.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self, ApiKeyError> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())?;
        let mut key = HeaderValue::from_str(key)?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            key,
        })
    }

    /// Uses the backend's `X-API-KEY` header.
    pub fn x_api_key(inner: C, key: &str) -> Result<Self, ApiKeyError> {
        Self::new(inner, API_KEY_HEADER, key)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}
