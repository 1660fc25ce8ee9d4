//! Protocol message types.
//!
//! [`HttpRequest`] is the evolving protocol message built by the Serialize
//! and Build phases and consumed by the transport. [`HttpResponse`] is the
//! raw response handed to the Deserialize phase.
//!
//! Request bodies are either replayable (an in-memory buffer that can be
//! cloned for a retry) or one-shot (readable exactly once, like a stream).

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

/// The body of an outgoing request.
#[derive(Debug, Default)]
pub struct SdkBody {
    inner: BodyInner,
}

#[derive(Debug, Default)]
enum BodyInner {
    #[default]
    Empty,
    Replayable(Bytes),
    Once(Bytes),
}

impl SdkBody {
    /// Creates an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a replayable body from an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            inner: BodyInner::Replayable(bytes.into()),
        }
    }

    /// Creates a body that can be read exactly once.
    #[must_use]
    pub fn once(bytes: impl Into<Bytes>) -> Self {
        Self {
            inner: BodyInner::Once(bytes.into()),
        }
    }

    /// Returns `true` if the body can be cloned for another attempt.
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        !matches!(self.inner, BodyInner::Once(_))
    }

    /// Returns the body bytes when they can be inspected without consuming.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.inner {
            BodyInner::Empty => Some(&[]),
            BodyInner::Replayable(bytes) => Some(bytes),
            BodyInner::Once(_) => None,
        }
    }

    /// Returns the body length when it is known.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.bytes().map(|b| b.len() as u64)
    }

    /// Clones the body if it is replayable.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match &self.inner {
            BodyInner::Empty => Some(Self::empty()),
            BodyInner::Replayable(bytes) => Some(Self::from_bytes(bytes.clone())),
            BodyInner::Once(_) => None,
        }
    }

    /// Consumes the body, yielding its bytes for sending.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self.inner {
            BodyInner::Empty => Bytes::new(),
            BodyInner::Replayable(bytes) | BodyInner::Once(bytes) => bytes,
        }
    }
}

/// An outgoing protocol message.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: SdkBody,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: Method::POST,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            body: SdkBody::empty(),
        }
    }
}

impl HttpRequest {
    /// Creates a blank request (`POST /`, no headers, empty body).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Sets the request method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Sets the request URI.
    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Inserts a header, replacing any existing value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &SdkBody {
        &self.body
    }

    /// Replaces the request body.
    pub fn set_body(&mut self, body: SdkBody) {
        self.body = body;
    }

    /// Clones the request if its body is replayable.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        Some(Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
        })
    }

    /// Splits the request into its method, URI, headers and body.
    #[must_use]
    pub fn into_parts(self) -> (Method, Uri, HeaderMap, SdkBody) {
        (self.method, self.uri, self.headers, self.body)
    }

    /// Converts into an `http::Request` for a concrete client.
    pub fn into_http(self) -> Result<http::Request<Bytes>, http::Error> {
        let mut builder = http::Request::builder().method(self.method).uri(self.uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder.body(self.body.into_bytes())
    }
}

/// A raw response received from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
