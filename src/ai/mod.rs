//! AI Subsystem
//!
//! LLM provider abstraction, structured-output schemas, JSON repair, image
//! generation, and timeout management.

pub mod image;
pub mod provider;
pub mod schema;
pub mod timeout;
pub mod validation;

pub use image::{GeminiImageGenerator, GeneratedImage, ImageGenerator};
pub use provider::{
    GeminiProvider, LlmProvider, LlmResponse, ProviderConfig, RetryingProvider, SharedProvider,
    TokenUsage, ToolOptions, create_provider,
};
pub use schema::{AeoAnalysis, ReviewResponse};
pub use timeout::{TimeoutConfig, with_timeout};
