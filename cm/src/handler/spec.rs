//! Handler definitions

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::HandlerOverrides;
use crate::domain::{Address, CollaboratorRegistry};
use crate::policy::{CompletionPolicy, PolicyKind, build_policy};
use crate::router::KeywordTable;
use crate::synth::SynthesisMode;

/// Placeholder in a scrape URL template replaced by the encoded query
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Where a handler's auxiliary (non-collaborator) result comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxiliarySource {
    /// No auxiliary result; completion depends on collaborators alone
    None,

    /// Ask a scraper for the page at `url_template` with the query filled in
    Scrape { address: Address, url_template: String },

    /// Ask a web search agent with the raw query
    Search { address: Address },

    /// Run the handler's own base analysis prompt at dispatch
    SelfAnalysis { template: String },
}

impl AuxiliarySource {
    /// Address auxiliary replies are expected from, if any
    pub fn address(&self) -> Option<&Address> {
        match self {
            AuxiliarySource::Scrape { address, .. } | AuxiliarySource::Search { address } => Some(address),
            AuxiliarySource::None | AuxiliarySource::SelfAnalysis { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuxiliarySource::None => "none",
            AuxiliarySource::Scrape { .. } => "scrape",
            AuxiliarySource::Search { .. } => "search",
            AuxiliarySource::SelfAnalysis { .. } => "self-analysis",
        }
    }
}

/// Fill the query into a scrape URL template, form-encoded (`+` for spaces)
pub fn scrape_url(url_template: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    url_template.replace(QUERY_PLACEHOLDER, &encoded)
}

/// Everything that distinguishes one handler from another
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    /// Config key and CLI name, e.g. `job-matching`
    pub name: String,
    pub display_name: String,
    pub address: Address,
    pub registry: CollaboratorRegistry,
    pub keywords: KeywordTable,
    pub policy: PolicyKind,
    /// Fixed-delay wait
    pub delay: Option<Duration>,
    /// Finalize-anyway timeout for pending-set and dual-source
    pub stall_timeout: Option<Duration>,
    pub auxiliary: AuxiliarySource,
    pub synthesis: SynthesisMode,
    pub temperature: f32,
}

impl HandlerSpec {
    /// Apply config overrides on top of the built-in definition
    pub fn with_overrides(mut self, overrides: &HandlerOverrides) -> Self {
        debug!(handler = %self.name, ?overrides, "HandlerSpec::with_overrides: called");
        if let Some(policy) = overrides.policy {
            self.policy = policy;
        }
        if let Some(delay) = overrides.delay() {
            self.delay = Some(delay);
        }
        if let Some(stall) = overrides.stall_timeout() {
            self.stall_timeout = Some(stall);
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        self
    }

    /// Instantiate this handler's completion policy
    pub fn completion_policy(&self) -> Arc<dyn CompletionPolicy> {
        build_policy(self.policy, self.delay, self.stall_timeout)
    }
}
