//! Invocation identity.
//!
//! The [`InvocationId`] is generated once per operation call and sent with
//! every attempt of that call so the service can correlate retries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for each operation invocation, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for log correlation
/// across attempts of the same call.
///
/// # Example
///
/// ```
/// use strata_core::InvocationId;
///
/// let id = InvocationId::new();
/// println!("Invocation: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Creates a new unique invocation id using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an `InvocationId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InvocationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_ids_are_unique() {
        assert_ne!(InvocationId::new(), InvocationId::new());
    }

    #[test]
    fn test_invocation_ids_are_time_ordered() {
        let first = InvocationId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = InvocationId::new();
        assert!(first.as_uuid() < second.as_uuid());
    }

    #[test]
    fn test_display_matches_uuid() {
        let uuid = Uuid::now_v7();
        assert_eq!(InvocationId::from_uuid(uuid).to_string(), uuid.to_string());
    }
}
