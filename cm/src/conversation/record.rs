//! Conversation record - the state of one in-flight request

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::SearchHit;
use crate::domain::{Address, CollaboratorId, ConversationId};

/// Result from an auxiliary (non-collaborator) source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AuxiliaryPayload {
    /// Text of a scraped page
    Page { text: String },

    /// Web search results
    Search { query: String, results: Vec<SearchHit> },

    /// Base analysis produced by the handler's own generation call
    Analysis { text: String },
}

/// What happened to an inbound collaborator reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Merged into results and removed from the outstanding set
    Accepted,
    /// The collaborator already replied; the first reply is kept
    Duplicate,
    /// The sender was never asked (or its request failed to send)
    Unsolicited,
    /// The record already finalized; late replies are dropped
    Finalized,
}

/// Everything the synthesizer and responder need once a record finalizes
#[derive(Debug, Clone)]
pub struct Gathered {
    pub conversation_id: ConversationId,
    pub query: String,
    pub reply_to: Address,
    pub reply_session: Option<ConversationId>,
    pub hops: u8,
    /// Every collaborator whose request was sent, replied or not
    pub consulted: BTreeSet<CollaboratorId>,
    pub results: BTreeMap<CollaboratorId, String>,
    pub auxiliary: Option<AuxiliaryPayload>,
}

/// Per-request state keyed by conversation ID
///
/// `query` and `reply_to` never change after creation. `outstanding` only
/// shrinks, `results` only grows, `auxiliary_result` is set at most once and
/// `finalized` flips exactly once, after which nothing else changes.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    id: ConversationId,
    query: String,
    reply_to: Address,
    reply_session: Option<ConversationId>,
    hops: u8,
    outstanding: BTreeSet<CollaboratorId>,
    results: BTreeMap<CollaboratorId, String>,
    auxiliary_result: Option<AuxiliaryPayload>,
    auxiliary_pending: bool,
    finalized: bool,
}

impl ConversationRecord {
    /// Create a record for a freshly received request
    pub fn new(
        id: ConversationId,
        query: impl Into<String>,
        reply_to: Address,
        reply_session: Option<ConversationId>,
        hops: u8,
        targets: BTreeSet<CollaboratorId>,
    ) -> Self {
        debug!(%id, %reply_to, target_count = targets.len(), "ConversationRecord::new: called");
        Self {
            id,
            query: query.into(),
            reply_to,
            reply_session,
            hops,
            outstanding: targets,
            results: BTreeMap::new(),
            auxiliary_result: None,
            auxiliary_pending: false,
            finalized: false,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn reply_to(&self) -> &Address {
        &self.reply_to
    }

    pub fn hops(&self) -> u8 {
        self.hops
    }

    pub fn outstanding(&self) -> &BTreeSet<CollaboratorId> {
        &self.outstanding
    }

    pub fn results(&self) -> &BTreeMap<CollaboratorId, String> {
        &self.results
    }

    pub fn auxiliary_result(&self) -> Option<&AuxiliaryPayload> {
        self.auxiliary_result.as_ref()
    }

    /// Whether an auxiliary request is in flight and has not answered yet
    pub fn awaiting_auxiliary(&self) -> bool {
        self.auxiliary_pending && self.auxiliary_result.is_none()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Drop a target whose request could not be sent
    pub fn abandon_target(&mut self, target: &CollaboratorId) {
        if self.finalized {
            return;
        }
        debug!(id = %self.id, %target, "ConversationRecord::abandon_target: called");
        self.outstanding.remove(target);
    }

    /// Note that an auxiliary request was dispatched and its reply is awaited
    pub fn expect_auxiliary(&mut self) {
        if self.finalized {
            return;
        }
        debug!(id = %self.id, "ConversationRecord::expect_auxiliary: called");
        self.auxiliary_pending = true;
    }

    /// Merge a collaborator reply
    pub fn record_reply(&mut self, sender: &CollaboratorId, result: impl Into<String>) -> ReplyOutcome {
        debug!(id = %self.id, %sender, "ConversationRecord::record_reply: called");
        if self.finalized {
            return ReplyOutcome::Finalized;
        }
        if self.results.contains_key(sender) {
            return ReplyOutcome::Duplicate;
        }
        if !self.outstanding.remove(sender) {
            return ReplyOutcome::Unsolicited;
        }
        self.results.insert(sender.clone(), result.into());
        ReplyOutcome::Accepted
    }

    /// Store the auxiliary result; returns false if one is already set or the
    /// record has finalized
    pub fn set_auxiliary(&mut self, payload: AuxiliaryPayload) -> bool {
        debug!(id = %self.id, "ConversationRecord::set_auxiliary: called");
        if self.finalized || self.auxiliary_result.is_some() {
            return false;
        }
        self.auxiliary_result = Some(payload);
        true
    }

    /// Check-and-set the finalized flag
    ///
    /// Returns true exactly once per record.
    pub fn try_finalize(&mut self) -> bool {
        if self.finalized {
            debug!(id = %self.id, "ConversationRecord::try_finalize: already finalized");
            return false;
        }
        debug!(id = %self.id, "ConversationRecord::try_finalize: finalizing");
        self.finalized = true;
        true
    }

    /// Snapshot for synthesis and the terminal reply
    pub fn gathered(&self) -> Gathered {
        Gathered {
            conversation_id: self.id.clone(),
            query: self.query.clone(),
            reply_to: self.reply_to.clone(),
            reply_session: self.reply_session.clone(),
            hops: self.hops,
            consulted: self.outstanding.iter().chain(self.results.keys()).cloned().collect(),
            results: self.results.clone(),
            auxiliary: self.auxiliary_result.clone(),
        }
    }
}
