//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for structured LLM output generation with
//! optional web-search grounding. All providers return `LlmResponse` with
//! token usage metrics for cost tracking.
//!
//! ## Modules
//!
//! - `gemini`: Gemini API provider (structured output + search grounding)
//! - `retry`: Retry decorator with classification-driven backoff

mod gemini;
mod retry;

pub use gemini::GeminiProvider;
pub use retry::RetryingProvider;

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::types::Result;

// =============================================================================
// Tool Options
// =============================================================================

/// Provider tools enabled for a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolOptions {
    /// Web search grounding
    pub search: bool,
    /// URL-fetch context
    pub url_context: bool,
}

impl ToolOptions {
    /// No tools (plain structured generation)
    pub fn none() -> Self {
        Self::default()
    }

    /// Search + URL context, as used by the generation stage
    pub fn grounded() -> Self {
        Self {
            search: true,
            url_context: true,
        }
    }

    pub fn any(&self) -> bool {
        self.search || self.url_context
    }
}

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Complete LLM response including content and usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated content: structured JSON when a schema was given,
    /// `Value::String` otherwise
    pub content: Value,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Number of grounding/search attributions the provider reported
    /// (0 when tools were off or the provider gave none; informational)
    pub grounding_count: usize,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            grounding_count: 0,
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }

    /// Content as text, whether the provider returned a string or JSON
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    pub model: String,
    pub provider: String,
}

/// Shared LLM provider type for concurrent access across pipeline stages.
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for LLM providers
///
/// API keys are handled securely: never serialized to output and redacted in
/// debug output. Providers convert the key to SecretString internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "gemini"
    pub provider: String,
    /// Model name (provider-specific)
    pub model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,
    /// API key; never serialized to output
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_output_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    16384
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            timeout_secs: crate::constants::network::LLM_TIMEOUT_SECS,
            temperature: 0.7,
            api_key: None,
            api_base: None,
            max_output_tokens: 16384,
        }
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// LLM Provider trait for structured output generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate output constrained by `schema` (pass `Value::Null` for free
    /// text), with the requested tools enabled.
    async fn generate(&self, prompt: &str, schema: &Value, tools: ToolOptions)
    -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a retry-wrapped shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    let inner: SharedProvider = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiProvider::new(config.clone())?),
        _ => {
            return Err(crate::types::ForgeError::Config(format!(
                "Unknown provider: {}. Supported: gemini",
                config.provider
            )));
        }
    };
    Ok(Arc::new(RetryingProvider::new(inner)))
}
