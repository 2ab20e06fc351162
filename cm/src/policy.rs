//! Completion policies
//!
//! A completion policy decides, on every event a conversation sees, whether
//! the record is ready to finalize. Three strategies share one interface:
//!
//! - **Fixed-delay:** wait a fixed interval, then finalize with whatever arrived
//! - **Pending-set:** finalize the moment every consulted collaborator replied
//! - **Dual-source:** the auxiliary result is the only gate; collaborator
//!   replies that are present when it lands are included
//!
//! Pending-set and dual-source wait indefinitely unless a stall timeout is
//! configured.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::ConversationRecord;

/// Default wait for the fixed-delay policy
pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_secs(4);

/// Something that happened to a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    /// All requests for the conversation have been sent
    Dispatched,
    /// A collaborator reply was merged
    CollaboratorReplied,
    /// The auxiliary result arrived
    AuxiliaryArrived,
    /// The timer armed at dispatch fired
    TimerElapsed,
}

/// Outcome of evaluating a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Finalize,
    Wait,
}

/// Strategy deciding when a conversation has gathered enough
pub trait CompletionPolicy: Send + Sync + std::fmt::Debug {
    /// Policy kind, for logs and listings
    fn kind(&self) -> PolicyKind;

    /// Timer to arm once dispatch completes, if any
    fn timer(&self) -> Option<Duration>;

    /// Decide whether the record should finalize after `event`
    fn evaluate(&self, event: PolicyEvent, record: &ConversationRecord) -> Verdict;
}

/// Policy selector used in handler definitions and config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    FixedDelay,
    PendingSet,
    DualSource,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::FixedDelay => write!(f, "fixed-delay"),
            PolicyKind::PendingSet => write!(f, "pending-set"),
            PolicyKind::DualSource => write!(f, "dual-source"),
        }
    }
}

/// Wait a fixed interval, then finalize regardless of what is outstanding
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_DELAY)
    }
}

impl CompletionPolicy for FixedDelay {
    fn kind(&self) -> PolicyKind {
        PolicyKind::FixedDelay
    }

    fn timer(&self) -> Option<Duration> {
        Some(self.delay)
    }

    fn evaluate(&self, event: PolicyEvent, _record: &ConversationRecord) -> Verdict {
        match event {
            PolicyEvent::TimerElapsed => Verdict::Finalize,
            _ => Verdict::Wait,
        }
    }
}

/// Finalize once the outstanding set is empty
#[derive(Debug, Clone, Default)]
pub struct PendingSetExhaustion {
    stall_timeout: Option<Duration>,
}

impl PendingSetExhaustion {
    pub fn new(stall_timeout: Option<Duration>) -> Self {
        Self { stall_timeout }
    }
}

impl CompletionPolicy for PendingSetExhaustion {
    fn kind(&self) -> PolicyKind {
        PolicyKind::PendingSet
    }

    fn timer(&self) -> Option<Duration> {
        self.stall_timeout
    }

    fn evaluate(&self, event: PolicyEvent, record: &ConversationRecord) -> Verdict {
        if event == PolicyEvent::TimerElapsed || record.outstanding().is_empty() {
            Verdict::Finalize
        } else {
            Verdict::Wait
        }
    }
}

/// Finalize when the auxiliary result lands (or none is coming)
#[derive(Debug, Clone, Default)]
pub struct DualSourceJoin {
    stall_timeout: Option<Duration>,
}

impl DualSourceJoin {
    pub fn new(stall_timeout: Option<Duration>) -> Self {
        Self { stall_timeout }
    }
}

impl CompletionPolicy for DualSourceJoin {
    fn kind(&self) -> PolicyKind {
        PolicyKind::DualSource
    }

    fn timer(&self) -> Option<Duration> {
        self.stall_timeout
    }

    fn evaluate(&self, event: PolicyEvent, record: &ConversationRecord) -> Verdict {
        if event == PolicyEvent::TimerElapsed || !record.awaiting_auxiliary() {
            Verdict::Finalize
        } else {
            Verdict::Wait
        }
    }
}

/// Build a policy from its kind and timing parameters
///
/// `delay` only applies to fixed-delay, `stall_timeout` to the other two.
pub fn build_policy(
    kind: PolicyKind,
    delay: Option<Duration>,
    stall_timeout: Option<Duration>,
) -> Arc<dyn CompletionPolicy> {
    debug!(%kind, ?delay, ?stall_timeout, "build_policy: called");
    match kind {
        PolicyKind::FixedDelay => Arc::new(FixedDelay::new(delay.unwrap_or(DEFAULT_FIXED_DELAY))),
        PolicyKind::PendingSet => Arc::new(PendingSetExhaustion::new(stall_timeout)),
        PolicyKind::DualSource => Arc::new(DualSourceJoin::new(stall_timeout)),
    }
}
