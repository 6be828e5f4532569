//! Stage Abstraction
//!
//! A stage reads the context and returns a typed output; only the engine
//! writes outputs back. This keeps the parallel fan-out free of shared
//! mutable state: safety by topology, not mutual exclusion.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::{
    CitationsResult, ImageResult, InternalLinksResult, MetadataResult, TocResult,
};
use crate::types::article::ValidatedArticle;
use crate::types::{ArticleOutput, CompanyContext, LinkablePool, QualityReport, Result};

/// Typed output of one stage execution
#[derive(Debug, Clone)]
pub enum StageOutput {
    Company {
        company: CompanyContext,
        pool: LinkablePool,
    },
    Prompt(String),
    Article(ArticleOutput),
    Refined {
        article: ArticleOutput,
        optimized: bool,
    },
    Citations(CitationsResult),
    InternalLinks(InternalLinksResult),
    Toc(TocResult),
    Metadata(MetadataResult),
    Images(ImageResult),
    Merged(ValidatedArticle),
    Quality(QualityReport),
    Storage(BTreeMap<String, PathBuf>),
}

/// A stage's output plus the warnings it accumulated
#[derive(Debug, Clone)]
pub struct StageReport {
    pub output: StageOutput,
    pub warnings: Vec<String>,
}

impl StageReport {
    pub fn new(output: StageOutput) -> Self {
        Self {
            output,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(output: StageOutput, warnings: Vec<String>) -> Self {
        Self { output, warnings }
    }
}

/// A pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Position in the fixed topology
    fn number(&self) -> u8;

    /// Stable name used for timings and logs
    fn name(&self) -> &'static str;

    /// Execute against a read-only view of the context
    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport>;
}
