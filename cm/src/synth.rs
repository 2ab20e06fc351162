//! Synthesizer
//!
//! Merges gathered collaborator results and the auxiliary excerpt into one
//! prompt, makes the single generation call and returns the reply text.
//! Synthesis never fails: backend and template errors become a textual
//! placeholder in the reply.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::conversation::{AuxiliaryPayload, Gathered};
use crate::domain::{CollaboratorId, CollaboratorRegistry};
use crate::llm::{CompletionRequest, LlmClient, StopReason};
use crate::prompts::{PromptContext, PromptLoader};

/// Fixed sentence used when no collaborator contributed
pub const NO_COLLABORATOR_INPUT: &str = "No additional collaborator input was used.";

/// Prefix of the placeholder returned when generation fails
pub const GENERATION_FAILURE_PREFIX: &str = "Generation failed";

/// Default character bound on auxiliary excerpts
pub const DEFAULT_EXCERPT_LIMIT: usize = 2000;

const SEARCH_HIT_LIMIT: usize = 3;
const SEARCH_CONTENT_LIMIT: usize = 200;
const UNKNOWN_COLLABORATOR: &str = "Unnamed collaborator";

/// How a handler turns gathered results into its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Render `template` and make one generation call at finalize
    Prompted { template: String },

    /// Reply with the handler's own base analysis (its auxiliary result)
    /// followed by the collaborator notes; no generation call at finalize
    Annotated,
}

/// The placeholder reply for a failed generation
pub fn failure_placeholder(reason: impl std::fmt::Display) -> String {
    format!("{}: {}", GENERATION_FAILURE_PREFIX, reason)
}

/// The first `limit` characters of `text`, or all of it when shorter
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn display_name<'a>(id: &CollaboratorId, registry: &'a CollaboratorRegistry) -> std::borrow::Cow<'a, str> {
    match registry.name_of(id) {
        Some(name) => std::borrow::Cow::Borrowed(name),
        None => std::borrow::Cow::Owned(format!("{} ({})", UNKNOWN_COLLABORATOR, id.short())),
    }
}

/// Deterministic summary of every contributing collaborator
///
/// Entries follow collaborator ID order. Returns [`NO_COLLABORATOR_INPUT`]
/// when nothing was gathered.
pub fn collaborator_summary(results: &BTreeMap<CollaboratorId, String>, registry: &CollaboratorRegistry) -> String {
    debug!(result_count = results.len(), "collaborator_summary: called");
    if results.is_empty() {
        return NO_COLLABORATOR_INPUT.to_string();
    }

    let mut summary = String::from("Additional collaborator insights were included:\n");
    for (id, text) in results {
        summary.push_str(&format!("\n---\n{} Insights:\n{}\n", display_name(id, registry), text.trim()));
    }
    summary
}

/// Comma-separated display names of the consulted collaborators
pub fn consulted_names(consulted: &BTreeSet<CollaboratorId>, registry: &CollaboratorRegistry) -> String {
    consulted
        .iter()
        .map(|id| display_name(id, registry).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bounded prompt excerpt of an auxiliary result
pub fn auxiliary_excerpt(auxiliary: &AuxiliaryPayload, limit: usize) -> String {
    debug!(%limit, "auxiliary_excerpt: called");
    match auxiliary {
        AuxiliaryPayload::Page { text } | AuxiliaryPayload::Analysis { text } => truncate_chars(text, limit).to_string(),
        AuxiliaryPayload::Search { results, .. } => {
            let mut excerpt = String::new();
            for hit in results.iter().take(SEARCH_HIT_LIMIT) {
                excerpt.push_str(&format!(
                    "- {}: {}...\nURL: {}\n\n",
                    hit.title,
                    truncate_chars(&hit.content, SEARCH_CONTENT_LIMIT),
                    hit.url
                ));
            }
            truncate_chars(&excerpt, limit).to_string()
        }
    }
}

/// Base analysis followed by the collaborator notes section
pub fn annotate(base: &str, results: &BTreeMap<CollaboratorId, String>, registry: &CollaboratorRegistry) -> String {
    debug!(base_len = base.len(), result_count = results.len(), "annotate: called");
    let mut reply = base.trim().to_string();
    if results.is_empty() {
        reply.push_str("\n\n");
        reply.push_str(NO_COLLABORATOR_INPUT);
        return reply;
    }

    reply.push_str("\n\nAdditional Collaborator Insights:\n");
    for (id, text) in results {
        reply.push_str(&format!("From {}:\n{}\n\n", display_name(id, registry), text.trim()));
    }
    reply.trim_end().to_string()
}

/// Builds prompts and calls the generation backend
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    excerpt_limit: usize,
    max_tokens: u32,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, excerpt_limit: usize, max_tokens: u32) -> Self {
        debug!(%excerpt_limit, %max_tokens, "Synthesizer::new: called");
        Self {
            llm,
            prompts,
            excerpt_limit,
            max_tokens,
        }
    }

    /// Template context for a finalized conversation
    pub fn prompt_context(&self, gathered: &Gathered, registry: &CollaboratorRegistry) -> PromptContext {
        PromptContext {
            query: gathered.query.clone(),
            collaborators: collaborator_summary(&gathered.results, registry),
            excerpt: gathered
                .auxiliary
                .as_ref()
                .map(|aux| auxiliary_excerpt(aux, self.excerpt_limit))
                .filter(|excerpt| !excerpt.is_empty()),
            consulted: consulted_names(&gathered.consulted, registry),
        }
    }

    /// Render the prompt for a finalized conversation
    pub fn build_prompt(
        &self,
        template: &str,
        gathered: &Gathered,
        registry: &CollaboratorRegistry,
    ) -> eyre::Result<String> {
        debug!(%template, conversation = %gathered.conversation_id, "Synthesizer::build_prompt: called");
        self.prompts.render(template, &self.prompt_context(gathered, registry))
    }

    /// Make one generation call; failures come back as the placeholder text
    pub async fn generate(&self, prompt: String, temperature: f32) -> String {
        debug!(prompt_len = prompt.len(), %temperature, "Synthesizer::generate: called");
        let request = CompletionRequest::prompt(prompt, temperature, self.max_tokens);
        match self.llm.complete(request).await {
            Ok(response) => {
                debug!(tokens = response.usage.total(), "Synthesizer::generate: completed");
                match response.stop_reason {
                    StopReason::MaxTokens => {
                        warn!(max_tokens = self.max_tokens, "Synthesizer::generate: reply truncated at max tokens");
                    }
                    StopReason::ContentFilter => warn!("Synthesizer::generate: reply cut by content filter"),
                    StopReason::EndTurn => {}
                }
                match response.content {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => {
                        warn!("Synthesizer::generate: backend returned no content");
                        failure_placeholder("empty response from generation backend")
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Synthesizer::generate: generation call failed");
                failure_placeholder(e)
            }
        }
    }

    /// Render `template` against the bare query and generate from it
    ///
    /// Used for the base analysis a handler requests of itself at dispatch.
    pub async fn analyze(&self, template: &str, query: &str, temperature: f32) -> String {
        debug!(%template, "Synthesizer::analyze: called");
        let context = PromptContext {
            query: query.to_string(),
            collaborators: NO_COLLABORATOR_INPUT.to_string(),
            ..Default::default()
        };
        match self.prompts.render(template, &context) {
            Ok(prompt) => self.generate(prompt, temperature).await,
            Err(e) => {
                warn!(error = %e, %template, "Synthesizer::analyze: prompt render failed");
                failure_placeholder(e)
            }
        }
    }

    /// Produce the terminal reply text for a finalized conversation
    pub async fn synthesize(
        &self,
        mode: &SynthesisMode,
        gathered: &Gathered,
        registry: &CollaboratorRegistry,
        temperature: f32,
    ) -> String {
        debug!(conversation = %gathered.conversation_id, ?mode, "Synthesizer::synthesize: called");
        match mode {
            SynthesisMode::Prompted { template } => match self.build_prompt(template, gathered, registry) {
                Ok(prompt) => self.generate(prompt, temperature).await,
                Err(e) => {
                    warn!(error = %e, %template, "Synthesizer::synthesize: prompt render failed");
                    failure_placeholder(e)
                }
            },
            SynthesisMode::Annotated => match &gathered.auxiliary {
                Some(AuxiliaryPayload::Analysis { text }) => annotate(text, &gathered.results, registry),
                _ => {
                    warn!(conversation = %gathered.conversation_id, "Synthesizer::synthesize: base analysis missing");
                    failure_placeholder("base analysis unavailable")
                }
            },
        }
    }
}
