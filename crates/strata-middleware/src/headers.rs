//! Header names written and read by the pipeline.

/// Invocation id, identical on every attempt of one call.
pub const INVOCATION_ID: &str = "x-strata-invocation-id";

/// Attempt counter, `attempt=N; max=M`.
pub const ATTEMPT: &str = "x-strata-attempt";

/// Hex SHA-256 of the request body, or [`UNSIGNED_PAYLOAD`].
pub const CONTENT_SHA256: &str = "x-strata-content-sha256";

/// Signing timestamp, `YYYYMMDDTHHMMSSZ`.
pub const DATE: &str = "x-strata-date";

/// Session token accompanying temporary credentials.
pub const SECURITY_TOKEN: &str = "x-strata-security-token";

/// Payload hash marker for bodies that cannot be read ahead of sending.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Response headers that may carry the service request id, in lookup order.
pub const REQUEST_ID: [&str; 3] = ["x-amzn-requestid", "x-amz-request-id", "x-request-id"];
