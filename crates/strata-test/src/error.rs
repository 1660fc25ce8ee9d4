//! Test error types.

use std::fmt;

/// Errors that can occur while building fixtures or inspecting captures.
#[derive(Debug)]
pub enum TestError {
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// Header name or value is invalid
    InvalidHeader(String),
    /// Body is not valid UTF-8 or not valid form encoding
    InvalidBody(String),
    /// No request was captured at the given index
    NoRequest(usize),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::InvalidBody(msg) => write!(f, "Invalid body: {msg}"),
            Self::NoRequest(index) => write!(f, "No request captured at index {index}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
