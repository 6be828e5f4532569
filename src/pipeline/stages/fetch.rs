//! Stage 0 - Data Fetch
//!
//! Resolves the company context and linkable pool through the injected
//! resolver. Sitemap failures degrade to an empty pool inside the resolver;
//! only a fundamentally unusable company URL is fatal here.

use async_trait::async_trait;
use tracing::info;

use crate::net::SharedResolver;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::Result;

pub struct FetchStage {
    resolver: SharedResolver,
}

impl FetchStage {
    pub fn new(resolver: SharedResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for FetchStage {
    fn number(&self) -> u8 {
        0
    }

    fn name(&self) -> &'static str {
        "data_fetch"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let (company, pool) = self.resolver.resolve(&ctx.job_config).await?;
        info!(
            company = %company.name,
            pool_size = pool.len(),
            "Resolved company context"
        );

        let mut warnings = Vec::new();
        if pool.is_empty() {
            warnings.push("linkable pool is empty; internal links will be skipped".to_string());
        }
        Ok(StageReport::with_warnings(
            StageOutput::Company { company, pool },
            warnings,
        ))
    }
}
