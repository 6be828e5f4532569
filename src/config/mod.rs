//! Configuration
//!
//! Layered configuration (defaults → global → project → env) plus the
//! per-run `JobConfig`.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    CitationsConfig, Config, ExportConfig, ExportFormat, JobConfig, NetworkConfig, PipelineConfig,
};
