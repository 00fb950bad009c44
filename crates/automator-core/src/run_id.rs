//! Run identifiers

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies one `automate` invocation
///
/// Every run gets a fresh ULID so events and status snapshots from a
/// superseded run can be told apart from the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Mint a new run ID
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Create a run ID from an existing string
    pub fn with_id(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
