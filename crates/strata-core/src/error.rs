//! Error types for Strata.
//!
//! This module provides [`SdkError`], the single error type surfaced by every
//! operation invocation, and [`ErrorKind`], the finite classification used by
//! the retry coordinator and by callers that branch on failures.
//!
//! # Taxonomy
//!
//! | `ErrorKind` | Origin | Sent on the wire? | Retried? |
//! |---|---|---|---|
//! | `Validation` | Input failed required-field checks | never | never |
//! | `Assembly` | Stack misconfigured (ordering, wiring, endpoint) | never | never |
//! | `Transport` | Connection, I/O or timeout failure | yes | per policy |
//! | `Protocol` | Response body could not be decoded | yes | never |
//! | `Service` | Service returned a structured error payload | yes | iff code is retryable |
//! | `Cancelled` | Caller context was cancelled | maybe | never |
//! | `NonRetryableBody` | Retry needed but body cannot be replayed | yes | never |
//! | `RetryExhausted` | Attempt or token budget ran out | yes | terminal |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using [`SdkError`].
pub type SdkResult<T> = Result<T, SdkError>;

/// Boxed error used as the source of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Finite classification of every [`SdkError`].
///
/// Classification tables key on this enum rather than on runtime type
/// inspection of the error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input was malformed; nothing was sent.
    Validation,
    /// The stack was misconfigured; nothing was sent.
    Assembly,
    /// Network-level failure.
    Transport,
    /// Response could not be decoded.
    Protocol,
    /// Service returned a structured error.
    Service,
    /// The call context ended.
    Cancelled,
    /// A retry was required but the request body is not replayable.
    NonRetryableBody,
    /// The retry budget ran out; the last error is preserved.
    RetryExhausted,
}

impl ErrorKind {
    /// Returns the machine-readable code used when no service code exists.
    #[must_use]
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Assembly => "ASSEMBLY_ERROR",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Service => "SERVICE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::NonRetryableBody => "NON_RETRYABLE_BODY",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
        }
    }

    /// Returns `true` if errors of this kind are raised before any network send.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Validation | Self::Assembly)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Standard error type for Strata.
///
/// `SdkError` carries enough structured detail (code, message, status,
/// request id) for callers to branch programmatically.
///
/// # Example
///
/// ```
/// use strata_core::{ErrorKind, SdkError};
///
/// let err = SdkError::service("Throttling", "Rate exceeded", 400);
/// assert_eq!(err.kind(), ErrorKind::Service);
/// assert_eq!(err.code(), "Throttling");
/// ```
#[derive(Error, Debug, Clone)]
pub enum SdkError {
    /// Input failed validation before serialization.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-specific validation errors.
        #[source]
        field_errors: FieldErrors,
    },

    /// The middleware stack could not be assembled or is miswired.
    #[error("Assembly error: {message}")]
    Assembly {
        /// Human-readable error message.
        message: String,
    },

    /// The request could not be delivered.
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message.
        message: String,
        /// Whether the failure was a timeout.
        timeout: bool,
        /// The underlying I/O or client error.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The response could not be decoded.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Human-readable error message.
        message: String,
        /// HTTP status of the undecodable response.
        status: Option<u16>,
        /// Service request id, if one was returned.
        request_id: Option<String>,
    },

    /// The service returned a structured error payload.
    #[error("Service error {code}: {message}")]
    Service {
        /// Service-declared error code.
        code: String,
        /// Service-supplied message.
        message: String,
        /// HTTP status of the error response.
        status: u16,
        /// Service request id, if one was returned.
        request_id: Option<String>,
    },

    /// The call context was cancelled.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Where the cancellation was observed.
        message: String,
    },

    /// A retry was attempted on a body that cannot be re-read.
    #[error("Request body cannot be replayed for attempt {attempt}")]
    NonRetryableBody {
        /// The attempt that could not be started.
        attempt: u32,
    },

    /// The retry budget ran out.
    #[error("Retry budget exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Number of attempts performed.
        attempts: u32,
        /// The error of the final attempt.
        #[source]
        source: Box<SdkError>,
    },
}

impl SdkError {
    /// Creates a validation error from field errors.
    #[must_use]
    pub fn validation(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors,
        }
    }

    /// Creates an assembly error.
    #[must_use]
    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Creates a transport error without a source.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: false,
            source: None,
        }
    }

    /// Creates a transport error wrapping an underlying error.
    pub fn transport_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: false,
            source: Some(Arc::from(source.into())),
        }
    }

    /// Creates a transport timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: true,
            source: None,
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            status: None,
            request_id: None,
        }
    }

    /// Creates a service error.
    #[must_use]
    pub fn service(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
            status,
            request_id: None,
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Wraps the final attempt's error once the retry budget is spent.
    #[must_use]
    pub fn exhausted(attempts: u32, last: SdkError) -> Self {
        Self::RetryExhausted {
            attempts,
            source: Box::new(last),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Assembly { .. } => ErrorKind::Assembly,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Service { .. } => ErrorKind::Service,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::NonRetryableBody { .. } => ErrorKind::NonRetryableBody,
            Self::RetryExhausted { .. } => ErrorKind::RetryExhausted,
        }
    }

    /// Returns the innermost error, looking through `RetryExhausted`.
    #[must_use]
    pub fn root(&self) -> &SdkError {
        match self {
            Self::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns a machine-readable code.
    ///
    /// Service errors report the service-declared code; everything else
    /// reports the code of its [`ErrorKind`].
    #[must_use]
    pub fn code(&self) -> &str {
        match self.root() {
            Self::Service { code, .. } => code,
            other => other.kind().as_code(),
        }
    }

    /// Returns the human-readable message of the root error.
    #[must_use]
    pub fn message(&self) -> String {
        match self.root() {
            Self::Validation { message, .. }
            | Self::Assembly { message }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. }
            | Self::Service { message, .. }
            | Self::Cancelled { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns the service request id, if known.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self.root() {
            Self::Service { request_id, .. } | Self::Protocol { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the HTTP status associated with the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::Service { status, .. } => Some(*status),
            Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` for transport timeouts.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Transport { timeout: true, .. })
    }

    /// Attaches a request id to service and protocol errors.
    ///
    /// Other variants are returned unchanged. An id that is already present
    /// is kept.
    #[must_use]
    pub fn with_request_id(self, id: impl Into<String>) -> Self {
        match self {
            Self::Service {
                code,
                message,
                status,
                request_id,
            } => Self::Service {
                code,
                message,
                status,
                request_id: request_id.or_else(|| Some(id.into())),
            },
            Self::Protocol {
                message,
                status,
                request_id,
            } => Self::Protocol {
                message,
                status,
                request_id: request_id.or_else(|| Some(id.into())),
            },
            Self::RetryExhausted { attempts, source } => Self::RetryExhausted {
                attempts,
                source: Box::new((*source).with_request_id(id)),
            },
            other => other,
        }
    }

    /// Attaches an HTTP status to protocol errors that lack one.
    #[must_use]
    pub fn with_status(mut self, http_status: u16) -> Self {
        if let Self::Protocol { status, .. } = &mut self {
            if status.is_none() {
                *status = Some(http_status);
            }
        }
        self
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.message(),
                kind: self.kind(),
                status: self.status(),
                details: self.error_details(),
            },
            request_id: self.request_id().map(ToString::to_string),
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { field_errors, .. } if !field_errors.is_empty() => {
                serde_json::to_value(field_errors).ok()
            }
            Self::RetryExhausted { attempts, source } => Some(serde_json::json!({
                "attempts": attempts,
                "last_error_kind": source.kind(),
            })),
            Self::NonRetryableBody { attempt } => Some(serde_json::json!({
                "attempt": attempt
            })),
            Self::Transport { timeout: true, .. } => Some(serde_json::json!({
                "timeout": true
            })),
            _ => None,
        }
    }
}

/// Field-specific validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Field validation errors")]
pub struct FieldErrors {
    /// Map of field path to list of error messages.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Records a missing required field.
    pub fn missing(&mut self, field: impl Into<String>) {
        self.add(field, "missing required field");
    }

    /// Returns `true` if there are no field errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns the field names with errors, in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Converts into a validation error, or `Ok(())` when empty.
    pub fn into_result(self, operation: &str) -> SdkResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let names = self.field_names().collect::<Vec<_>>().join(", ");
        Err(SdkError::validation(
            format!("invalid input for {operation}: {names}"),
            self,
        ))
    }
}

/// Serializable error envelope for logs and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The service request id for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error classification.
    pub kind: ErrorKind,
    /// HTTP status, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let mut fields = FieldErrors::new();
        fields.missing("UserName");
        let error = fields.into_result("DetachUserPolicy").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.kind().is_local());
        assert!(error.to_string().contains("UserName"));
    }

    #[test]
    fn test_empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result("Op").is_ok());
    }

    #[test]
    fn test_service_error_accessors() {
        let error = SdkError::service("Throttling", "Rate exceeded", 400).with_request_id("req-1");
        assert_eq!(error.kind(), ErrorKind::Service);
        assert_eq!(error.code(), "Throttling");
        assert_eq!(error.message(), "Rate exceeded");
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.request_id(), Some("req-1"));
    }

    #[test]
    fn test_request_id_is_not_overwritten() {
        let error = SdkError::service("X", "y", 500)
            .with_request_id("first")
            .with_request_id("second");
        assert_eq!(error.request_id(), Some("first"));
    }

    #[test]
    fn test_exhausted_looks_through_to_root() {
        let last = SdkError::service("ServiceUnavailable", "down", 503);
        let error = SdkError::exhausted(3, last).with_request_id("req-9");
        assert_eq!(error.kind(), ErrorKind::RetryExhausted);
        assert_eq!(error.root().kind(), ErrorKind::Service);
        assert_eq!(error.code(), "ServiceUnavailable");
        assert_eq!(error.status(), Some(503));
        assert_eq!(error.request_id(), Some("req-9"));
    }

    #[test]
    fn test_timeout_flag() {
        assert!(SdkError::timeout("read timed out").is_timeout());
        assert!(!SdkError::transport("connection reset").is_timeout());
    }

    #[test]
    fn test_protocol_status() {
        let error = SdkError::protocol("bad json").with_status(200);
        assert_eq!(error.status(), Some(200));
        assert_eq!(error.code(), "PROTOCOL_ERROR");
    }

    #[test]
    fn test_error_envelope_serialization() {
        let error = SdkError::service("NoSuchEntity", "user missing", 404).with_request_id("req-456");
        let json = serde_json::to_string(&error.to_envelope()).expect("serialization should work");
        assert!(json.contains("\"code\":\"NoSuchEntity\""));
        assert!(json.contains("\"request_id\":\"req-456\""));
        assert!(json.contains("\"kind\":\"service\""));
    }

    #[test]
    fn test_exhausted_envelope_details() {
        let error = SdkError::exhausted(2, SdkError::transport("reset"));
        let details = error.to_envelope().error.details.unwrap();
        assert_eq!(details["attempts"], 2);
        assert_eq!(details["last_error_kind"], "transport");
    }

    #[test]
    fn test_transport_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = SdkError::transport_with_source("connect failed", io);
        assert!(std::error::Error::source(&error).is_some());
    }
}
