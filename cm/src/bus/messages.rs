//! Message types for the Bus

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::error::BusError;
use crate::domain::{Address, ConversationId};

/// Application payloads carried between mailboxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Payload {
    /// Query sent to a handler or collaborator
    TaskRequest { query: String },

    /// Answer from a collaborator, or the final reply to a requester
    TaskResponse { result: String },

    /// Ask the website scraper for a page
    ScrapeRequest { url: String },

    /// Page text from the website scraper
    ScrapeResponse { text: String },

    /// Ask the web search service for results
    SearchRequest { query: String },

    /// Results from the web search service
    SearchResponse { query: String, results: Vec<SearchHit> },
}

impl Payload {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::TaskRequest { .. } => "task-request",
            Payload::TaskResponse { .. } => "task-response",
            Payload::ScrapeRequest { .. } => "scrape-request",
            Payload::ScrapeResponse { .. } => "scrape-response",
            Payload::SearchRequest { .. } => "search-request",
            Payload::SearchResponse { .. } => "search-response",
        }
    }
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// A payload addressed from one mailbox to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message ID (time-ordered)
    pub id: String,

    pub from: Address,

    pub to: Address,

    /// Conversation the message belongs to, from the receiver's point of view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<ConversationId>,

    /// Number of handler-to-handler forwards that preceded this message
    #[serde(default)]
    pub hops: u8,

    pub payload: Payload,
}

/// Internal requests to the Bus task
#[derive(Debug)]
pub enum BusRequest {
    /// Register a mailbox under an address
    Register {
        address: Address,
        tx: mpsc::Sender<Envelope>,
        reply_tx: oneshot::Sender<Result<(), BusError>>,
    },

    /// Remove a mailbox
    Unregister { address: Address },

    /// Deliver an envelope to its destination mailbox
    Deliver {
        envelope: Envelope,
        reply_tx: oneshot::Sender<Result<(), BusError>>,
    },

    /// Get current metrics
    GetMetrics { reply_tx: oneshot::Sender<BusMetrics> },

    /// Shutdown the bus
    Shutdown,
}

/// Bus metrics for observability
#[derive(Debug, Clone, Default)]
pub struct BusMetrics {
    pub registered_addresses: usize,
    pub messages_delivered: u64,
    pub delivery_failures: u64,
    pub requests_received: u64,
}
