//! Workflow Engine
//!
//! Runs the fixed topology: sequential prefix (0-2), conditional
//! non-blocking refinement (3), parallel fan-out (4-7 + images) with
//! collective inspection, then merge and gate. Per-stage wall times land
//! in the context; recoverable stage errors are recorded, never raised.
//!
//! The engine is one-shot; retries live in the regeneration controller so
//! they stay observable.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::JobConfig;
use crate::pipeline::PipelineDeps;
use crate::pipeline::context::{ExecutionContext, RunState};
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{Stage, StageReport};
use crate::types::Result;

pub struct WorkflowEngine {
    registry: StageRegistry,
}

impl WorkflowEngine {
    pub fn new(deps: &PipelineDeps) -> Self {
        Self {
            registry: StageRegistry::new(deps),
        }
    }

    /// Validate inputs and run the sequential prefix (Stages 0-1).
    /// Raises only on invalid config or an unusable company URL.
    pub async fn prepare(&self, job: JobConfig) -> Result<ExecutionContext> {
        job.validate()?;
        let mut ctx = ExecutionContext::new(job);
        info!(job_id = %ctx.job_id, keyword = %ctx.job_config.primary_keyword, "Run starting");

        ctx.state = RunState::Fetching;
        self.run_fatal(&self.registry.fetch, &mut ctx).await?;

        ctx.state = RunState::Prompting;
        self.run_fatal(&self.registry.prompt, &mut ctx).await?;
        Ok(ctx)
    }

    /// Stages 2 through 10 (generation through quality gate), excluding
    /// export. Recoverable failures are recorded in the context.
    pub async fn generate_and_gate(&self, ctx: &mut ExecutionContext) -> Result<()> {
        // ===== Stage 2: generation =====
        ctx.state = RunState::Generating;
        let (elapsed, result) = Self::timed(&self.registry.generation, ctx).await;
        ctx.record_time(self.registry.generation.name(), elapsed);
        match result {
            Ok(report) => ctx.apply(report),
            Err(e) => {
                error!("Generation failed: {}", e);
                ctx.error(format!("generation failed: {}", e));
                ctx.state = RunState::Failed;
                return Ok(());
            }
        }

        // ===== Stage 3: conditional, non-blocking refinement =====
        if ctx.structured_data.is_some() {
            ctx.state = RunState::Refining;
            let (elapsed, result) = Self::timed(&self.registry.refinement, ctx).await;
            ctx.record_time(self.registry.refinement.name(), elapsed);
            match result {
                Ok(report) => ctx.apply(report),
                Err(e) => {
                    // Refinement may never block the pipeline
                    warn!("Refinement error discarded: {}", e);
                    ctx.warn(format!("refinement error discarded: {}", e));
                }
            }
        }

        // ===== Parallel fan-out: 4, 5, 6, 7, images =====
        // Siblings run to completion; results are inspected collectively.
        ctx.state = RunState::Parallel;
        let shared: &ExecutionContext = ctx;
        let (citations, internal_links, toc, metadata, images) = tokio::join!(
            Self::timed(&self.registry.citations, shared),
            Self::timed(&self.registry.internal_links, shared),
            Self::timed(&self.registry.toc, shared),
            Self::timed(&self.registry.metadata, shared),
            Self::timed(&self.registry.images, shared),
        );

        let outcomes = [
            ("citations", true, citations),
            ("internal_links", true, internal_links),
            ("toc", false, toc),
            ("metadata", false, metadata),
            ("images", false, images),
        ];
        for (name, critical, (elapsed, result)) in outcomes {
            ctx.record_time(name, elapsed);
            match result {
                Ok(report) => ctx.apply(report),
                Err(e) if critical => {
                    error!(stage = name, "Critical parallel stage failed: {}", e);
                    ctx.error(format!("{} failed: {}", name, e));
                }
                Err(e) => {
                    warn!(stage = name, "Parallel stage degraded: {}", e);
                    ctx.warn(format!("{} degraded: {}", name, e));
                }
            }
        }

        // ===== Stage 8: merge and link =====
        ctx.state = RunState::Merging;
        let (elapsed, result) = Self::timed(&self.registry.merge, ctx).await;
        ctx.record_time(self.registry.merge.name(), elapsed);
        match result {
            Ok(report) => ctx.apply(report),
            Err(e) => {
                error!("Merge failed: {}", e);
                ctx.error(format!("merge failed: {}", e));
                ctx.state = RunState::Failed;
                return Ok(());
            }
        }

        // ===== Stage 10: quality gate (reports, never raises) =====
        ctx.state = RunState::Gating;
        let (elapsed, result) = Self::timed(&self.registry.quality_gate, ctx).await;
        ctx.record_time(self.registry.quality_gate.name(), elapsed);
        match result {
            Ok(report) => ctx.apply(report),
            Err(e) => {
                ctx.error(format!("quality gate failed: {}", e));
            }
        }
        Ok(())
    }

    /// Stage 9: export, post-gate so it observes the gated artifact
    pub async fn export(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let terminal = ctx.state;
        ctx.state = RunState::Exporting;
        let (elapsed, result) = Self::timed(&self.registry.export, ctx).await;
        ctx.record_time(self.registry.export.name(), elapsed);
        match result {
            Ok(report) => ctx.apply(report),
            Err(e) => {
                warn!("Export failed: {}", e);
                ctx.error(format!("export failed: {}", e));
            }
        }
        // A failed run stays failed through the export step
        if terminal == RunState::Failed {
            ctx.state = RunState::Failed;
        }
        Ok(())
    }

    /// One-shot run: prepare, generate-and-gate, export. No retries; wrap
    /// with the regeneration controller for gated regeneration.
    pub async fn run(&self, job: JobConfig) -> Result<ExecutionContext> {
        let mut ctx = self.prepare(job).await?;
        self.generate_and_gate(&mut ctx).await?;
        self.export(&mut ctx).await?;
        ctx.finalize_state();
        info!(job_id = %ctx.job_id, state = %ctx.state, "Run finished");
        Ok(ctx)
    }

    /// Sequential stage runner whose failure fails the run
    async fn run_fatal(&self, stage: &Arc<dyn Stage>, ctx: &mut ExecutionContext) -> Result<()> {
        let (elapsed, result) = Self::timed(stage, ctx).await;
        ctx.record_time(stage.name(), elapsed);
        match result {
            Ok(report) => {
                ctx.apply(report);
                Ok(())
            }
            Err(e) => {
                error!(stage = stage.name(), "Fatal stage failure: {}", e);
                ctx.error(format!("{} failed: {}", stage.name(), e));
                ctx.state = RunState::Failed;
                Err(e)
            }
        }
    }

    async fn timed(
        stage: &Arc<dyn Stage>,
        ctx: &ExecutionContext,
    ) -> (f64, Result<StageReport>) {
        let start = Instant::now();
        let result = stage.execute(ctx).await;
        (start.elapsed().as_secs_f64(), result)
    }
}

// =============================================================================
// Tests
// =============================================================================
