//! The identity plugin seam — one of §2's "Plugin interfaces (identity,
//! payment, skills, memory)": a typed contract the core consumes without
//! caring how the host actually stores or edits identity data.

use async_trait::async_trait;

use super::types::IdentitySnapshot;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Load the current identity snapshot, used to build a new session's
    /// system prompt.
    async fn current(&self) -> Result<IdentitySnapshot, String>;

    /// Persist an updated snapshot. Providers that are read-only (e.g. a
    /// snapshot baked into a container image) may return an error.
    async fn update(&self, snapshot: IdentitySnapshot) -> Result<(), String>;
}

/// A fixed, in-memory identity. Useful for tests and for hosts that don't
/// need runtime identity editing.
pub struct StaticIdentityProvider {
    snapshot: IdentitySnapshot,
}

impl StaticIdentityProvider {
    pub fn new(snapshot: IdentitySnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current(&self) -> Result<IdentitySnapshot, String> {
        Ok(self.snapshot.clone())
    }

    async fn update(&self, _snapshot: IdentitySnapshot) -> Result<(), String> {
        Err("static identity provider is read-only".to_string())
    }
}
