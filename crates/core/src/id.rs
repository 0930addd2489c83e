//! Unique identifiers for progress scopes.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a Scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(Ulid);

impl ScopeId {
    /// Generate a new ScopeId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
