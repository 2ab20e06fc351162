//! Conversation state
//!
//! One record per in-flight request, held in a store owned by the handler
//! that received the request.

mod record;
mod store;

pub use record::{AuxiliaryPayload, ConversationRecord, Gathered, ReplyOutcome};
pub use store::ConversationStore;
