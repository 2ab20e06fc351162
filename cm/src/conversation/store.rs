//! Conversation store
//!
//! Owned exclusively by one handler worker, so every read-modify-write of a
//! record happens on that worker without locks.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::record::ConversationRecord;
use crate::domain::ConversationId;

#[derive(Debug, Default)]
pub struct ConversationStore {
    records: HashMap<ConversationId, ConversationRecord>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record; refuses to replace an existing one
    pub fn insert(&mut self, record: ConversationRecord) -> bool {
        let id = record.id().clone();
        if self.records.contains_key(&id) {
            warn!(%id, "ConversationStore::insert: record already exists");
            return false;
        }
        debug!(%id, "ConversationStore::insert: called");
        self.records.insert(id, record);
        true
    }

    pub fn get(&self, id: &ConversationId) -> Option<&ConversationRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &ConversationId) -> Option<&mut ConversationRecord> {
        self.records.get_mut(id)
    }

    /// Discard a record once its terminal reply has been sent
    pub fn remove(&mut self, id: &ConversationId) -> Option<ConversationRecord> {
        debug!(%id, "ConversationStore::remove: called");
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
