//! The transport boundary.
//!
//! A [`Transport`] takes a fully signed request and returns the raw response.
//! It knows nothing about operations, retries or protocols. The default
//! implementation, [`HyperTransport`], sends over a pooled hyper client with
//! rustls for `https` endpoints and is meant to be shared by every call a
//! client makes.

use crate::step::BoxFuture;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use strata_core::{HttpRequest, HttpResponse, SdkError, SdkResult};
use tokio_util::sync::CancellationToken;

/// Sends a finalized request.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and returns the raw response.
    ///
    /// Implementations must stop promptly once `cancel` fires. A response
    /// with a non-success status is still `Ok`; classifying it is the
    /// deserializer's job.
    fn send<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, SdkResult<HttpResponse>>;
}

/// Transport over a pooled hyper client.
///
/// Both `http` and `https` URIs are accepted; TLS uses rustls with the
/// webpki root store. Connections are reused across calls; clone the
/// surrounding `Arc` rather than building a new transport per call.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HyperTransport {
    /// Default per-attempt timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a transport with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Creates a transport whose attempts time out after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);
        Self { client, timeout }
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn round_trip(&self, request: HttpRequest) -> SdkResult<HttpResponse> {
        let request = request
            .into_http()
            .map_err(|e| SdkError::transport_with_source("invalid request", e))?
            .map(Full::new);

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| SdkError::transport_with_source("request failed", e))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e: hyper::Error| {
                SdkError::transport_with_source("failed to read response body", e)
            })?
            .to_bytes();

        Ok(HttpResponse::new(parts.status, parts.headers, body))
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport for HyperTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, SdkResult<HttpResponse>> {
        Box::pin(async move {
            let uri = request.uri().clone();
            tracing::trace!(method = %request.method(), %uri, "sending request");

            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(SdkError::cancelled("cancelled during network send")),
                result = tokio::time::timeout(self.timeout, self.round_trip(request)) => {
                    result.unwrap_or_else(|_| {
                        Err(SdkError::timeout(format!(
                            "no response from {uri} within {:?}",
                            self.timeout
                        )))
                    })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(HyperTransport::new().timeout(), HyperTransport::DEFAULT_TIMEOUT);
        let transport = HyperTransport::with_timeout(Duration::from_millis(250));
        assert_eq!(transport.timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = HyperTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut request = HttpRequest::new();
        request.set_uri("http://127.0.0.1:9/".parse().unwrap());

        let err = transport.send(request, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), strata_core::ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = HyperTransport::with_timeout(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut request = HttpRequest::new();
        request.set_uri(format!("http://{addr}/").parse().unwrap());

        let err = transport.send(request, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), strata_core::ErrorKind::Transport);
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_https_uri_reaches_connect() {
        let transport = HyperTransport::with_timeout(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut request = HttpRequest::new();
        request.set_uri(format!("https://{addr}/").parse().unwrap());

        // The failure must come from the closed port, not from the scheme.
        let err = transport.send(request, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), strata_core::ErrorKind::Transport);
        let detail = format!("{err:?}");
        assert!(!detail.contains("scheme is not http"), "{detail}");
        assert!(!detail.contains("invalid URL"), "{detail}");
    }
}
