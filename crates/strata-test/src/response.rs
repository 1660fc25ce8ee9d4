//! Response fixtures.

use crate::error::TestError;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, DATE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use strata_core::HttpResponse;
use strata_middleware::headers::REQUEST_ID;

const JSON: &str = "application/json";

/// Builds raw responses for a mock transport to return.
///
/// # Example
///
/// ```
/// use strata_test::ResponseBuilder;
///
/// let response = ResponseBuilder::new(200)
///     .request_id("req-1")
///     .json(serde_json::json!({"ok": true}))
///     .build()
///     .unwrap();
///
/// assert_eq!(response.header("x-amzn-requestid"), Some("req-1"));
/// ```
#[derive(Debug)]
pub struct ResponseBuilder {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    error: Option<TestError>,
}

impl ResponseBuilder {
    /// Starts a response with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))
            .and_then(|name| {
                HeaderValue::from_str(value)
                    .map(|value| (name, value))
                    .map_err(|e| TestError::InvalidHeader(format!("{value}: {e}")))
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Adds the service request id header.
    #[must_use]
    pub fn request_id(self, id: &str) -> Self {
        self.header(REQUEST_ID[0], id)
    }

    /// Adds a `date` header.
    #[must_use]
    pub fn date(self, http_date: &str) -> Self {
        self.header(DATE.as_str(), http_date)
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and content type.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        self.body = Bytes::from(value.to_string());
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Json` if serialization fails.
    pub fn json_from<T: Serialize>(self, value: &T) -> Result<Self, TestError> {
        Ok(self.json(serde_json::to_value(value)?))
    }

    /// Finishes the response.
    ///
    /// # Errors
    ///
    /// Returns the first invalid header or status recorded while building.
    pub fn build(self) -> Result<HttpResponse, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| TestError::InvalidHeader(format!("status {}: {e}", self.status)))?;
        Ok(HttpResponse::new(status, self.headers, self.body))
    }
}

/// A 200 response with a JSON body.
#[must_use]
pub fn ok_json(value: Value) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    HttpResponse::new(StatusCode::OK, headers, value.to_string())
}

/// A 200 response with an empty JSON object.
#[must_use]
pub fn ok_empty() -> HttpResponse {
    ok_json(json!({}))
}

/// A service error document with the given status.
///
/// An invalid status falls back to 500.
#[must_use]
pub fn service_error(status: u16, code: &str, message: &str) -> HttpResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    let body = json!({ "code": code, "message": message });
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::new(status, headers, body.to_string())
}

/// A 429 throttling error.
#[must_use]
pub fn throttled() -> HttpResponse {
    service_error(429, "Throttling", "Rate exceeded")
}
