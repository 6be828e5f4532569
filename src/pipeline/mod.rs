//! Pipeline Orchestration
//!
//! The workflow engine and its fixed stage topology:
//!
//! ```text
//! 0 fetch → 1 prompt → 2 generation → (3 refinement?)
//!                                          ↓
//!              ┌── 4 citations ──┬── 5 internal links ──┐
//!              │   6 toc         │   7 metadata         │  images
//!              └────────────────────────────────────────┘
//!                                ↓
//!                   8 merge/link → 10 quality gate → 9 export
//! ```
//!
//! The engine is one-shot; the regeneration controller wraps it with the
//! bounded quality-retry loop.

pub mod context;
pub mod engine;
pub mod regeneration;
pub mod registry;
pub mod results;
pub mod stage;
pub mod stages;

pub use context::{ExecutionContext, RunState};
pub use engine::WorkflowEngine;
pub use regeneration::RegenerationController;
pub use registry::StageRegistry;
pub use results::ParallelResults;
pub use stage::{Stage, StageOutput, StageReport};

use std::sync::Arc;

use crate::ai::image::ImageGenerator;
use crate::ai::provider::SharedProvider;
use crate::ai::timeout::TimeoutConfig;
use crate::config::Config;
use crate::net::probe::SharedProber;
use crate::net::sitemap::SharedResolver;

/// Shared collaborators injected into the stage registry
pub struct PipelineDeps {
    pub provider: SharedProvider,
    pub prober: SharedProber,
    pub resolver: SharedResolver,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
    pub config: Config,
    pub timeouts: TimeoutConfig,
}
