//! careermesh - scatter-gather career advice over an agent mesh
//!
//! Each handler receives a career question, forwards it to the collaborator
//! handlers whose keywords it mentions, collects whatever they send back, and
//! answers its requester exactly once with a reply synthesized from its own
//! prompt plus the collaborators' contributions.
//!
//! # Core Concepts
//!
//! - **Conversation record**: per-request state owned by one handler worker
//! - **Completion policy**: decides when a record has gathered enough
//! - **At-most-once finalize**: a check-and-set on the record, never a flag race
//! - **Fire-and-forget sends**: every send reports success or failure at once
//!
//! # Modules
//!
//! - [`bus`] - In-process address registry and mailboxes
//! - [`router`] - Keyword matching against a collaborator registry
//! - [`conversation`] - Per-request records and their store
//! - [`policy`] - Fixed-delay, pending-set and dual-source completion
//! - [`synth`] - Prompt building and generation
//! - [`handler`] - The handler worker and the built-in catalog
//! - [`mesh`] - Spawning the network and asking it questions

pub mod bus;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod handler;
pub mod llm;
pub mod mesh;
pub mod policy;
pub mod prompts;
pub mod router;
pub mod synth;
