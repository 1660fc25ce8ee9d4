//! Table-driven retry classification.
//!
//! Classification looks only at [`ErrorKind`], the service error code and
//! the HTTP status. It never downcasts.

use std::collections::{BTreeSet, HashSet};
use strata_core::{ErrorKind, SdkError};

/// Why an error may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryKind {
    /// Connection failures and 5xx-class service errors.
    Transient,
    /// The attempt timed out.
    Timeout,
    /// The service asked the client to slow down.
    Throttling,
}

impl RetryKind {
    /// Returns a label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Throttling => "throttling",
        }
    }
}

/// How an error kind is treated before codes are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindPolicy {
    /// Always retryable.
    Transport,
    /// Retryable if the code or status is listed.
    CodeAndStatus,
    /// Retryable if the status is listed.
    StatusOnly,
    /// Never retryable.
    Never,
}

const KIND_POLICY: &[(ErrorKind, KindPolicy)] = &[
    (ErrorKind::Transport, KindPolicy::Transport),
    (ErrorKind::Service, KindPolicy::CodeAndStatus),
    (ErrorKind::Protocol, KindPolicy::StatusOnly),
    (ErrorKind::Validation, KindPolicy::Never),
    (ErrorKind::Assembly, KindPolicy::Never),
    (ErrorKind::Cancelled, KindPolicy::Never),
    (ErrorKind::NonRetryableBody, KindPolicy::Never),
    (ErrorKind::RetryExhausted, KindPolicy::Never),
];

/// Service error codes that mean "slow down".
pub const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];

/// Service error codes that are safe to retry as-is.
pub const TRANSIENT_CODES: &[&str] = &[
    "RequestTimeout",
    "RequestTimeoutException",
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
];

/// HTTP statuses that are safe to retry.
pub const TRANSIENT_STATUS: &[u16] = &[500, 502, 503, 504];

/// HTTP statuses that mean "slow down".
pub const THROTTLING_STATUS: &[u16] = &[429];

/// Classifies errors as retryable or final.
///
/// # Example
///
/// ```
/// use strata_core::SdkError;
/// use strata_middleware::retry::{RetryClassifier, RetryKind};
///
/// let classifier = RetryClassifier::default();
/// let err = SdkError::service("ThrottlingException", "Rate exceeded", 400);
/// assert_eq!(classifier.classify(&err), Some(RetryKind::Throttling));
/// assert_eq!(classifier.classify(&SdkError::assembly("bad wiring")), None);
/// ```
#[derive(Debug, Clone)]
pub struct RetryClassifier {
    throttling_codes: HashSet<String>,
    transient_codes: HashSet<String>,
    throttling_status: BTreeSet<u16>,
    transient_status: BTreeSet<u16>,
}

impl Default for RetryClassifier {
    fn default() -> Self {
        Self {
            throttling_codes: THROTTLING_CODES.iter().map(ToString::to_string).collect(),
            transient_codes: TRANSIENT_CODES.iter().map(ToString::to_string).collect(),
            throttling_status: THROTTLING_STATUS.iter().copied().collect(),
            transient_status: TRANSIENT_STATUS.iter().copied().collect(),
        }
    }
}

impl RetryClassifier {
    /// Creates a classifier with the standard tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a throttling error code.
    #[must_use]
    pub fn with_throttling_code(mut self, code: impl Into<String>) -> Self {
        self.throttling_codes.insert(code.into());
        self
    }

    /// Adds a transient error code.
    #[must_use]
    pub fn with_transient_code(mut self, code: impl Into<String>) -> Self {
        self.transient_codes.insert(code.into());
        self
    }

    /// Adds a transient HTTP status.
    #[must_use]
    pub fn with_transient_status(mut self, status: u16) -> Self {
        self.transient_status.insert(status);
        self
    }

    /// Returns why `err` may be retried, or `None` if it is final.
    #[must_use]
    pub fn classify(&self, err: &SdkError) -> Option<RetryKind> {
        let policy = KIND_POLICY
            .iter()
            .find(|(kind, _)| *kind == err.kind())
            .map_or(KindPolicy::Never, |(_, policy)| *policy);

        match policy {
            KindPolicy::Transport if err.is_timeout() => Some(RetryKind::Timeout),
            KindPolicy::Transport => Some(RetryKind::Transient),
            KindPolicy::CodeAndStatus => self
                .classify_code(err.code())
                .or_else(|| self.classify_status(err.status())),
            KindPolicy::StatusOnly => self.classify_status(err.status()),
            KindPolicy::Never => None,
        }
    }

    fn classify_code(&self, code: &str) -> Option<RetryKind> {
        if self.throttling_codes.contains(code) {
            Some(RetryKind::Throttling)
        } else if self.transient_codes.contains(code) {
            Some(RetryKind::Transient)
        } else {
            None
        }
    }

    fn classify_status(&self, status: Option<u16>) -> Option<RetryKind> {
        let status = status?;
        if self.throttling_status.contains(&status) {
            Some(RetryKind::Throttling)
        } else if self.transient_status.contains(&status) {
            Some(RetryKind::Transient)
        } else {
            None
        }
    }
}
