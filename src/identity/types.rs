use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of an agent's identity, as assembled by an
/// [`IdentityProvider`](super::traits::IdentityProvider) from whatever
/// backing store the host wires up (files, a database row, a remote
/// config service).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    /// Display name the agent presents as.
    pub name: String,
    /// Freeform persona/personality text folded into the system prompt.
    pub persona: String,
    /// User-facing profile notes (preferences, context the agent should know).
    pub user_profile: String,
    /// Operating instructions distinct from persona (house rules, tone).
    pub operating_instructions: String,
}

impl IdentitySnapshot {
    /// Render this snapshot as the system prompt text for a fresh session.
    pub fn as_system_prompt(&self) -> String {
        let mut sections = Vec::new();
        if !self.persona.is_empty() {
            sections.push(self.persona.clone());
        }
        if !self.operating_instructions.is_empty() {
            sections.push(self.operating_instructions.clone());
        }
        if !self.user_profile.is_empty() {
            sections.push(format!("User profile:\n{}", self.user_profile));
        }
        sections.join("\n\n")
    }
}
