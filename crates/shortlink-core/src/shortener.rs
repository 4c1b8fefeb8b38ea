//! Client for the external URL shortening service
//!
//! The service is queried with `GET <base>?api=<token>&url=<target>&format=text`
//! and answers with the short link as plain text, or with some other text
//! when it refuses the request.

use crate::config::CoreSettings;
use crate::utils::{is_http_url, mask_token, truncate_str};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Longest response excerpt kept in errors.
const MAX_ERROR_EXCERPT_CHARS: usize = 200;
/// Largest response body read from the service. A short link is far smaller.
pub const MAX_RESPONSE_BYTES: usize = 4096;

/// Errors that can occur while shortening a link
#[derive(Debug, Error)]
pub enum ShortenError {
    /// The shortener base URL or the request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// The service did not answer within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Non-success HTTP status
    #[error("API error: HTTP {status}")]
    Api {
        /// HTTP status code returned by the service
        status: u16,
    },
    /// The service answered, but not with a link
    #[error("Unexpected response: {0}")]
    UnexpectedPayload(String),
}

/// Interface for URL shortening services
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortenerProvider: Send + Sync {
    /// Shorten `url` on behalf of the user owning `token`
    async fn shorten(&self, token: &str, url: &str) -> Result<String, ShortenError>;
}

/// A single outbound shortening request.
#[derive(Debug, Clone)]
pub struct ShortenRequest<'a> {
    /// Link the user wants shortened
    pub original_url: &'a str,
    /// User's API token
    pub token: &'a str,
}

impl ShortenRequest<'_> {
    /// Build the outbound URL against `base_url`, query-encoding the target.
    ///
    /// # Errors
    ///
    /// Returns `ShortenError::InvalidRequest` if `base_url` is not a valid URL.
    pub fn outbound_url(&self, base_url: &str) -> Result<Url, ShortenError> {
        Url::parse_with_params(
            base_url,
            &[
                ("api", self.token),
                ("url", self.original_url),
                ("format", "text"),
            ],
        )
        .map_err(|e| ShortenError::InvalidRequest(e.to_string()))
    }
}

/// Shortening service reached over HTTP.
pub struct HttpShortener {
    http_client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl HttpShortener {
    /// Create a client for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http_client,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Create a client from the core settings.
    #[must_use]
    pub fn from_settings(settings: &CoreSettings) -> Self {
        Self::new(
            settings.shortener_base_url.clone(),
            settings.shortener_timeout(),
        )
    }

    /// Read the body, giving up once it exceeds `MAX_RESPONSE_BYTES`.
    async fn read_capped(&self, mut response: reqwest::Response) -> Result<String, ShortenError> {
        let too_large = || {
            ShortenError::UnexpectedPayload(format!(
                "response body exceeds {MAX_RESPONSE_BYTES} bytes"
            ))
        };

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn classify(&self, err: reqwest::Error) -> ShortenError {
        // The request URL carries the user's token
        let err = err.without_url();
        if err.is_timeout() {
            ShortenError::Timeout(self.timeout)
        } else {
            ShortenError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ShortenerProvider for HttpShortener {
    async fn shorten(&self, token: &str, url: &str) -> Result<String, ShortenError> {
        let request = ShortenRequest {
            original_url: url,
            token,
        };
        let outbound = request.outbound_url(&self.base_url)?;

        debug!(
            "Shortening {} with token {}",
            truncate_str(url, MAX_ERROR_EXCERPT_CHARS),
            mask_token(token)
        );

        let response = self
            .http_client
            .get(outbound)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Shortener answered with HTTP {status}");
            return Err(ShortenError::Api {
                status: status.as_u16(),
            });
        }

        let body = self.read_capped(response).await?;
        let short_url = body.trim();

        if is_http_url(short_url) {
            Ok(short_url.to_string())
        } else {
            Err(ShortenError::UnexpectedPayload(truncate_str(
                short_url,
                MAX_ERROR_EXCERPT_CHARS,
            )))
        }
    }
}
