//! Requests captured by the mock transport.

use crate::error::TestError;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use strata_core::HttpRequest;

/// A request exactly as the transport received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl CapturedRequest {
    pub(crate) fn capture(request: HttpRequest) -> Self {
        let (method, uri, headers, body) = request.into_parts();
        Self {
            method,
            uri,
            headers,
            body: body.into_bytes(),
        }
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `TestError::InvalidBody` if the body is not UTF-8.
    pub fn text(&self) -> Result<&str, TestError> {
        std::str::from_utf8(&self.body).map_err(|e| TestError::InvalidBody(e.to_string()))
    }

    /// Decodes an `application/x-www-form-urlencoded` body into pairs, in
    /// wire order.
    ///
    /// # Errors
    ///
    /// Returns `TestError::InvalidBody` if the body is not UTF-8 or a
    /// component is not valid percent-encoding.
    pub fn form(&self) -> Result<Vec<(String, String)>, TestError> {
        let text = self.text()?;
        if text.is_empty() {
            return Ok(Vec::new());
        }
        text.split('&')
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                Ok((decode(key)?, decode(value)?))
            })
            .collect()
    }

    /// Returns one decoded form parameter.
    ///
    /// # Errors
    ///
    /// Returns `TestError::InvalidBody` if the body cannot be decoded.
    pub fn form_param(&self, name: &str) -> Result<Option<String>, TestError> {
        Ok(self
            .form()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value))
    }
}

fn decode(component: &str) -> Result<String, TestError> {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| TestError::InvalidBody(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use strata_core::SdkBody;

    fn captured(body: &'static str) -> CapturedRequest {
        let mut request = HttpRequest::new();
        request.set_method(Method::POST);
        request.set_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        request.set_body(SdkBody::from_bytes(body));
        CapturedRequest::capture(request)
    }

    #[test]
    fn test_form_decoding() {
        let request = captured("Action=DetachUserPolicy&UserName=a%20b%26c&Empty=");
        let form = request.form().unwrap();
        assert_eq!(form[0], ("Action".to_string(), "DetachUserPolicy".to_string()));
        assert_eq!(form[1], ("UserName".to_string(), "a b&c".to_string()));
        assert_eq!(form[2], ("Empty".to_string(), String::new()));
        assert_eq!(
            request.form_param("UserName").unwrap().as_deref(),
            Some("a b&c")
        );
        assert!(request.form_param("Missing").unwrap().is_none());
    }

    #[test]
    fn test_empty_body() {
        let request = captured("");
        assert!(request.form().unwrap().is_empty());
        assert_eq!(request.method(), Method::POST);
        assert_eq!(
            request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }
}
