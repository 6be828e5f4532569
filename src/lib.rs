//! BlogForge - AI-Driven SEO/AEO Article Generation Pipeline
//!
//! Turns a single seed (primary keyword + company URL) into a validated
//! long-form article with multi-format exports and a quality report, by
//! orchestrating a fixed multi-stage pipeline around a search-grounded LLM.
//!
//! ## Core Features
//!
//! - **Fixed Stage Topology**: sequential prefix, conditional refinement,
//!   parallel fan-out, deterministic merge, quality gate
//! - **Quality Refinement**: concurrent per-field AI review and AEO
//!   enhancement with zero-tolerance typography post-conditions
//! - **Citation Resolution**: URL probing with authority fallbacks and
//!   competitor/self-link suppression
//! - **Gated Regeneration**: bounded retries driven by the AEO score and
//!   hard invariants, best attempt wins
//!
//! ## Quick Start
//!
//! ```ignore
//! use blogforge::config::{Config, JobConfig};
//! use blogforge::pipeline::{PipelineDeps, RegenerationController, WorkflowEngine};
//!
//! let config = Config::default();
//! let deps = PipelineDeps { /* provider, prober, resolver, ... */ };
//! let controller = RegenerationController::new(WorkflowEngine::new(&deps));
//! let ctx = controller.run(JobConfig::new(&config, keyword, url)).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM provider abstraction, schemas, JSON repair, images
//! - [`pipeline`]: the workflow engine, stages, and regeneration controller
//! - [`text`]: pure primitives (entity encoding, dash removal, linkifier)
//! - [`net`]: URL probing and sitemap resolution
//! - [`export`]: HTML/Markdown/JSON/CSV emitters
//! - [`config`]: layered configuration and per-run job inputs

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod export;
pub mod net;
pub mod pipeline;
pub mod text;
pub mod types;

#[cfg(test)]
pub mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, ExportFormat, JobConfig};

// Error Types
pub use types::error::{ErrorCategory, ForgeError, Result};

// Domain
pub use types::{ArticleOutput, CitationMap, CompanyContext, LinkablePool, QualityReport};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    ExecutionContext, PipelineDeps, RegenerationController, RunState, WorkflowEngine,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    GeminiProvider,
    LlmProvider,
    LlmResponse,
    RetryingProvider,
    SharedProvider,
    TimeoutConfig,
    ToolOptions,
    create_provider,
    with_timeout,
};
