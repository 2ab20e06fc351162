//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for rendering prompt templates
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    /// The user's query, verbatim
    pub query: String,
    /// Collaborator summary, or the fixed no-input sentence
    pub collaborators: String,
    /// Bounded auxiliary excerpt, absent when no auxiliary result arrived
    pub excerpt: Option<String>,
    /// Comma-separated display names of the consulted collaborators
    pub consulted: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (`mesh.prompt-dir` in config)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that prefers templates found in `user_dir`
    ///
    /// A directory that does not exist is ignored.
    pub fn new(user_dir: Option<PathBuf>) -> Self {
        debug!(?user_dir, "PromptLoader::new: called");
        let user_dir = user_dir.filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                debug!(?dir, "PromptLoader::new: override directory not found");
            }
            exists
        });
        Self {
            hbs: Self::engine(),
            user_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    // Prompts are plain text: no HTML escaping
    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks the override directory (`{name}.pmt`) first, then the embedded set.
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, query_len = context.query.len(), "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}
