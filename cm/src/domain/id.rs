//! Identifier types for the mesh
//!
//! Addresses name mailboxes on the bus. Conversation IDs key the per-request
//! state a handler keeps while it gathers collaborator replies.

use serde::{Deserialize, Serialize};

/// Mailbox address of a handler, collaborator or requester
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

/// Collaborators are identified by their mailbox address
pub type CollaboratorId = Address;

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last six characters, used when a registry has no display name
    pub fn short(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(5)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generate a time-ordered message ID
pub fn generate_message_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Key of one in-flight request
///
/// A handler derives it from the ID of the envelope that carried the original
/// request; collaborators echo it back as the session of their replies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Mint a fresh conversation ID (used by requesters)
    pub fn new() -> Self {
        Self(generate_message_id())
    }

    /// Derive the conversation ID from the originating message ID
    pub fn from_message(message_id: &str) -> Self {
        Self(message_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
