//! careermesh configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bus::BusConfig;
use crate::policy::PolicyKind;

/// Main careermesh configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation backend configuration
    pub llm: LlmConfig,

    /// Bus and coordination settings shared by every handler
    pub mesh: MeshConfig,

    /// Per-handler overrides, keyed by handler name (e.g. `demand-analysis`)
    pub handlers: HashMap<String, HandlerOverrides>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set and that requesters
    /// wait longer than one generation call. Only commands that call the
    /// generation backend need this.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).map(|k| k.is_empty()).unwrap_or(true) {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.mesh.reply_timeout_ms <= self.llm.timeout_ms {
            return Err(eyre::eyre!(
                "mesh reply-timeout-ms ({}) must exceed llm timeout-ms ({}) so a failed generation still reaches the requester",
                self.mesh.reply_timeout_ms,
                self.llm.timeout_ms
            ));
        }
        if self.mesh.bus.mailbox_buffer == 0 || self.mesh.bus.channel_buffer == 0 {
            return Err(eyre::eyre!("mesh buffers must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .careermesh.yml
        let local_config = PathBuf::from(".careermesh.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/careermesh/careermesh.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("careermesh").join("careermesh.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Overrides for one handler, if any were configured
    pub fn overrides_for(&self, handler: &str) -> Option<&HandlerOverrides> {
        self.handlers.get(handler)
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (only "openai" - any OpenAI-compatible API - is supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "asi1-mini".to_string(),
            api_key_env: "ASI1_API_KEY".to_string(),
            base_url: "https://api.asi1.ai".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

/// Mesh-wide coordination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Bus channel sizes (`bus-buffer`, `mailbox-buffer`)
    #[serde(flatten)]
    pub bus: BusConfig,

    /// Requests arriving with this many forwards consult no collaborators
    #[serde(rename = "max-hops")]
    pub max_hops: u8,

    /// Character bound on auxiliary excerpts in prompts
    #[serde(rename = "excerpt-limit")]
    pub excerpt_limit: usize,

    /// How long a requester waits for the terminal reply; must exceed the
    /// generation timeout
    #[serde(rename = "reply-timeout-ms")]
    pub reply_timeout_ms: u64,

    /// Directory holding `.pmt` overrides
    #[serde(rename = "prompt-dir", skip_serializing_if = "Option::is_none")]
    pub prompt_dir: Option<PathBuf>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            max_hops: 2,
            excerpt_limit: 2000,
            reply_timeout_ms: 180_000,
            prompt_dir: None,
        }
    }
}

impl MeshConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Overrides for a single handler's built-in behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOverrides {
    /// Completion policy to use instead of the handler's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyKind>,

    /// Fixed-delay wait in milliseconds
    #[serde(rename = "delay-ms", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    /// Finalize with whatever arrived once this long has passed since dispatch
    #[serde(rename = "stall-timeout-ms", skip_serializing_if = "Option::is_none")]
    pub stall_timeout_ms: Option<u64>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl HandlerOverrides {
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms.map(Duration::from_millis)
    }
}
