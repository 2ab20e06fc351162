//! Bus error types

use thiserror::Error;

use crate::domain::Address;

/// Errors from registering mailboxes or delivering envelopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("No mailbox registered for {0}")]
    UnknownAddress(Address),

    #[error("Address already registered: {0}")]
    AddressInUse(Address),

    #[error("Mailbox full for {0}")]
    MailboxFull(Address),

    #[error("Mailbox closed for {0}")]
    MailboxClosed(Address),

    #[error("Bus channel closed")]
    Closed,
}
