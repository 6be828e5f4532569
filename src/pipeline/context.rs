//! Execution Context
//!
//! Typed, mutable, per-job state. Created by the engine at job start,
//! updated only through `apply` (the single write seam for stage outputs),
//! consumed by the caller at the end of the run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::JobConfig;
use crate::pipeline::results::ParallelResults;
use crate::pipeline::stage::{StageOutput, StageReport};
use crate::types::article::ValidatedArticle;
use crate::types::{ArticleOutput, CompanyContext, LinkablePool, QualityReport};

// =============================================================================
// Run State
// =============================================================================

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Fetching,
    Prompting,
    Generating,
    Refining,
    Parallel,
    Merging,
    Gating,
    Regenerating,
    Exporting,
    Done,
    Degraded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Degraded | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Fetching => "FETCHING",
            Self::Prompting => "PROMPTING",
            Self::Generating => "GENERATING",
            Self::Refining => "REFINING",
            Self::Parallel => "PARALLEL",
            Self::Merging => "MERGING",
            Self::Gating => "GATING",
            Self::Regenerating => "REGENERATING",
            Self::Exporting => "EXPORTING",
            Self::Done => "DONE",
            Self::Degraded => "DEGRADED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Execution Context
// =============================================================================

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: String,
    /// Immutable job inputs
    pub job_config: JobConfig,
    pub state: RunState,

    /// Stage 0 outputs
    pub company_data: Option<CompanyContext>,
    pub linkable_pool: LinkablePool,

    /// Stage 1 output
    pub prompt_text: Option<String>,
    /// Feedback prepended to the prompt on regeneration
    pub review_feedback: Option<String>,

    /// Stage 2 output (possibly refined by Stage 3)
    pub structured_data: Option<ArticleOutput>,
    /// Set by Stage 3 on success (informational only)
    pub stage_3_optimized: bool,

    /// Parallel fan-out outputs
    pub parallel_results: ParallelResults,

    /// Stage 8 output
    pub validated_article: Option<ValidatedArticle>,

    /// Stage 10 output
    pub quality_report: Option<QualityReport>,

    /// Stage 9 output: format -> file path
    pub storage_result: BTreeMap<String, PathBuf>,

    /// Stage name -> wall seconds
    pub execution_times: BTreeMap<String, f64>,

    /// Append-only
    pub warnings: Vec<String>,
    pub errors: Vec<String>,

    pub regeneration_attempts: u32,
}

impl ExecutionContext {
    pub fn new(job_config: JobConfig) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            job_config,
            state: RunState::Init,
            company_data: None,
            linkable_pool: Vec::new(),
            prompt_text: None,
            review_feedback: None,
            structured_data: None,
            stage_3_optimized: false,
            parallel_results: ParallelResults::default(),
            validated_article: None,
            quality_report: None,
            storage_result: BTreeMap::new(),
            execution_times: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            regeneration_attempts: 0,
        }
    }

    /// Apply a stage report. The engine is the only caller; parallel stages
    /// contribute through disjoint `parallel_results` slots.
    pub fn apply(&mut self, report: StageReport) {
        self.warnings.extend(report.warnings);
        match report.output {
            StageOutput::Company { company, pool } => {
                self.company_data = Some(company);
                self.linkable_pool = pool;
            }
            StageOutput::Prompt(prompt) => self.prompt_text = Some(prompt),
            StageOutput::Article(article) => self.structured_data = Some(article),
            StageOutput::Refined { article, optimized } => {
                self.structured_data = Some(article);
                self.stage_3_optimized = optimized;
            }
            StageOutput::Citations(result) => self.parallel_results.citations = Some(result),
            StageOutput::InternalLinks(result) => {
                self.parallel_results.internal_links = Some(result)
            }
            StageOutput::Toc(result) => self.parallel_results.toc = Some(result),
            StageOutput::Metadata(result) => self.parallel_results.metadata = Some(result),
            StageOutput::Images(result) => self.parallel_results.images = Some(result),
            StageOutput::Merged(article) => self.validated_article = Some(article),
            StageOutput::Quality(report) => self.quality_report = Some(report),
            StageOutput::Storage(paths) => self.storage_result = paths,
        }
    }

    /// Record a stage's wall time
    pub fn record_time(&mut self, stage_name: &str, seconds: f64) {
        self.execution_times.insert(stage_name.to_string(), seconds);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Reset everything downstream of Stage 1 for a regeneration attempt,
    /// keeping company data and the linkable pool from the first run.
    pub fn prepare_regeneration(&mut self, feedback: String) {
        self.regeneration_attempts += 1;
        self.review_feedback = Some(feedback);
        self.structured_data = None;
        self.stage_3_optimized = false;
        self.parallel_results = ParallelResults::default();
        self.validated_article = None;
        self.quality_report = None;
        self.state = RunState::Regenerating;
    }

    /// Map the run onto its terminal state
    pub fn finalize_state(&mut self) {
        self.state = if self.passed() {
            RunState::Done
        } else if self.validated_article.is_some() {
            RunState::Degraded
        } else {
            RunState::Failed
        };
    }

    /// Quality gate passed?
    pub fn passed(&self) -> bool {
        self.quality_report.as_ref().is_some_and(|r| r.passed)
    }

    /// Current AEO score (0 when the gate has not run)
    pub fn aeo_score(&self) -> f64 {
        self.quality_report.as_ref().map_or(0.0, |r| r.aeo_score)
    }
}

// =============================================================================
// Tests
// =============================================================================
