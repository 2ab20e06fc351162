//! Collaborator registry
//!
//! Static mapping from collaborator address to display name. Every handler
//! carries its own registry; they overlap but are not identical.

use tracing::debug;

use super::id::{Address, CollaboratorId};

/// Read-only mapping of collaborator IDs to display names
#[derive(Debug, Clone, Default)]
pub struct CollaboratorRegistry {
    entries: Vec<(CollaboratorId, String)>,
}

impl CollaboratorRegistry {
    /// Build a registry from `(address, display name)` pairs
    pub fn from_pairs<A, N>(pairs: impl IntoIterator<Item = (A, N)>) -> Self
    where
        A: Into<Address>,
        N: Into<String>,
    {
        let entries: Vec<(CollaboratorId, String)> = pairs
            .into_iter()
            .map(|(addr, name)| (addr.into(), name.into()))
            .collect();
        debug!(entry_count = entries.len(), "CollaboratorRegistry::from_pairs: called");
        Self { entries }
    }

    /// Display name of a collaborator, if known
    pub fn name_of(&self, id: &CollaboratorId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(addr, _)| addr == id)
            .map(|(_, name)| name.as_str())
    }

    /// All collaborator IDs registered under a display name
    pub fn ids_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CollaboratorId> + 'a {
        self.entries
            .iter()
            .filter(move |(_, n)| n == name)
            .map(|(addr, _)| addr)
    }

    pub fn contains(&self, id: &CollaboratorId) -> bool {
        self.entries.iter().any(|(addr, _)| addr == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CollaboratorId, &str)> {
        self.entries.iter().map(|(addr, name)| (addr, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
