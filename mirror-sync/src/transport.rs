//! Request transport.
//!
//! One GET per queue entry against the device's `/pfodWeb` endpoint. The
//! body is a decoded [`Response`] document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::Response;
use reqwest::Client;
use url::Url;

use crate::error::TransportError;
use crate::queue::FetchRequest;

/// Path of the device endpoint.
pub const ENDPOINT_PATH: &str = "/pfodWeb";

/// Issues one request and decodes the answer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `request`.
    ///
    /// # Errors
    ///
    /// Any [`TransportError`] counts as a failed attempt.
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, TransportError> {
        (**self).fetch(request).await
    }
}

/// HTTP transport backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<InnerTransport>,
}

struct InnerTransport {
    http: Client,
    endpoint: Url,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a transport for the device at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] for an unparseable URL and
    /// [`TransportError::Http`] if the client cannot be built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, TransportError> {
        let mut endpoint =
            Url::parse(base_url.as_ref()).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(format!(
                "{} cannot be a base URL",
                base_url.as_ref()
            )));
        }
        if endpoint.path().is_empty() || endpoint.path() == "/" {
            endpoint.set_path(ENDPOINT_PATH);
        }

        let http = Client::builder()
            .user_agent(format!("mirror-client/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerTransport { http, endpoint }),
        })
    }

    /// Endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Full URL for `request`.
    #[must_use]
    pub fn url_for(&self, request: &FetchRequest) -> Url {
        let mut url = self.inner.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("cmd", &request.cmd);
            if let Some(version) = &request.version {
                query.append_pair("version", version);
            }
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, TransportError> {
        let url = self.url_for(request);
        tracing::debug!("GET {url}");

        let response = self
            .inner
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Response::Empty);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_and_query() {
        let transport = HttpTransport::new("http://device.local").expect("transport");
        assert_eq!(transport.endpoint().path(), "/pfodWeb");

        let url = transport.url_for(&FetchRequest {
            cmd: "{v1:main}".to_string(),
            version: Some("v1".to_string()),
        });
        assert_eq!(url.as_str(), "http://device.local/pfodWeb?cmd=%7Bv1%3Amain%7D&version=v1");
    }

    #[test]
    fn test_custom_path_is_kept() {
        let transport = HttpTransport::new("http://device.local/api").expect("transport");
        assert_eq!(transport.endpoint().path(), "/api");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpTransport::new("not a url"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTransport::new("mailto:someone@example.com"),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
