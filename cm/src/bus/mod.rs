//! In-process message bus
//!
//! The Bus stands in for the agent runtime: it maps addresses to bounded
//! mailboxes and delivers envelopes between them. Delivery is fire-and-forget
//! but every send reports immediately whether the bus accepted it.

mod config;
mod core;
mod error;
mod handle;
mod messages;

pub use config::BusConfig;
pub use core::{Bus, BusClient};
pub use error::BusError;
pub use handle::{Mailbox, Outbox};
pub use messages::{BusMetrics, BusRequest, Envelope, Payload, SearchHit};
