//! Domain types for careermesh
//!
//! Addresses, conversation IDs and the per-handler collaborator registry.

mod id;
mod registry;

pub use id::{Address, CollaboratorId, ConversationId, generate_message_id};
pub use registry::CollaboratorRegistry;
