//! Regeneration Controller
//!
//! Wraps the one-shot engine with the bounded quality-retry loop: when the
//! gate fails and budget remains, the run restarts from generation with a
//! feedback message built from the failed invariants and the weakest
//! sub-scores. Company data and the linkable pool are kept from the first
//! run. The best attempt by AEO score is what ultimately gets exported.

use tracing::info;

use crate::config::JobConfig;
use crate::pipeline::context::{ExecutionContext, RunState};
use crate::pipeline::engine::WorkflowEngine;
use crate::types::article::ValidatedArticle;
use crate::types::{ArticleOutput, QualityReport, Result};

pub struct RegenerationController {
    engine: WorkflowEngine,
}

/// Snapshot of the best gate attempt so far
struct BestAttempt {
    score: f64,
    article: ValidatedArticle,
    report: QualityReport,
    structured: Option<ArticleOutput>,
}

impl RegenerationController {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }

    /// Run the full pipeline with gated regeneration, then export once.
    pub async fn run(&self, job: JobConfig) -> Result<ExecutionContext> {
        let max_regenerations = job.max_regenerations;
        let mut ctx = self.engine.prepare(job).await?;
        let mut best: Option<BestAttempt> = None;

        loop {
            self.engine.generate_and_gate(&mut ctx).await?;

            if let (Some(article), Some(report)) = (&ctx.validated_article, &ctx.quality_report)
                && best.as_ref().is_none_or(|b| report.aeo_score > b.score)
            {
                best = Some(BestAttempt {
                    score: report.aeo_score,
                    article: article.clone(),
                    report: report.clone(),
                    structured: ctx.structured_data.clone(),
                });
            }

            if ctx.passed() {
                break;
            }
            if ctx.regeneration_attempts >= max_regenerations {
                info!(
                    attempts = ctx.regeneration_attempts,
                    "Regeneration budget exhausted"
                );
                break;
            }

            let feedback = build_feedback(&ctx);
            info!(
                attempt = ctx.regeneration_attempts + 1,
                max = max_regenerations,
                "Quality gate failed, regenerating"
            );
            ctx.prepare_regeneration(feedback);
        }

        // Ship the best attempt when the final one is not the best
        if !ctx.passed()
            && let Some(best) = best
            && (best.score > ctx.aeo_score() || ctx.validated_article.is_none())
        {
            ctx.structured_data = best.structured;
            ctx.validated_article = Some(best.article);
            ctx.quality_report = Some(best.report);
            if ctx.state == RunState::Failed {
                ctx.state = RunState::Gating;
            }
        }

        self.engine.export(&mut ctx).await?;
        ctx.finalize_state();
        info!(
            job_id = %ctx.job_id,
            state = %ctx.state,
            score = ctx.aeo_score(),
            attempts = ctx.regeneration_attempts,
            "Run finished"
        );
        Ok(ctx)
    }
}

/// Feedback prepended to the regeneration prompt: failed invariants plus
/// the lowest sub-scores, or a schema reminder after a parse failure.
fn build_feedback(ctx: &ExecutionContext) -> String {
    match &ctx.quality_report {
        Some(report) => {
            let mut lines = vec!["The previous article failed these quality checks:".to_string()];
            for issue in &report.critical_issues {
                lines.push(format!("- {}", issue));
            }
            for (name, score) in report.sub_scores.weakest().iter().take(2) {
                lines.push(format!("- weak metric {}: {:.0}/100", name, score));
            }
            lines.push("Fix every listed problem in the regenerated article.".to_string());
            lines.join("\n")
        }
        None => "The previous attempt produced unusable structured output. Return complete, \
                 schema-valid JSON with every required field populated."
            .to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::PipelineDeps;
    use crate::testing::{
        ScriptedProvider, StaticProber, StaticResolver, sample_article_value, sample_company,
        sample_job,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn controller_with(
        provider: ScriptedProvider,
        output_dir: &std::path::Path,
    ) -> RegenerationController {
        let mut config = Config::default();
        config.export.output_dir = output_dir.to_path_buf();
        let deps = PipelineDeps {
            provider: Arc::new(provider),
            prober: Arc::new(StaticProber::accept_all()),
            resolver: Arc::new(StaticResolver::new(sample_company(), Vec::new())),
            image_generator: None,
            config,
            timeouts: Default::default(),
        };
        RegenerationController::new(WorkflowEngine::new(&deps))
    }

    fn dispatch(schema: &Value, article: Value) -> Value {
        let props = schema.get("properties");
        if props.is_some_and(|p| p.get("Headline").is_some()) {
            article
        } else if props.is_some_and(|p| p.get("citations").is_some()) {
            json!({"citations": 15, "conversational_phrases": 10, "question_patterns": 6})
        } else {
            json!({"fixed_content": "", "issues_fixed": 0})
        }
    }

    #[tokio::test]
    async fn test_happy_path_no_regeneration() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            ScriptedProvider::new(|_p, schema| Ok(dispatch(schema, sample_article_value())));
        let controller = controller_with(provider, dir.path());

        let ctx = controller.run(sample_job()).await.unwrap();
        assert_eq!(ctx.state, RunState::Done, "errors: {:?}", ctx.errors);
        assert_eq!(ctx.regeneration_attempts, 0);
        assert!(ctx.quality_report.unwrap().passed);
    }

    #[tokio::test]
    async fn test_regeneration_cap_reaches_degraded() {
        // Sources never parse, so the citation map stays empty and the gate
        // fails every attempt
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(|_p, schema| {
            let mut article = sample_article_value();
            article["Sources"] = json!("no parseable source lines here");
            Ok(dispatch(schema, article))
        });
        let controller = controller_with(provider, dir.path());

        let ctx = controller.run(sample_job()).await.unwrap();
        assert_eq!(ctx.regeneration_attempts, 2);
        assert_eq!(ctx.state, RunState::Degraded);
        let report = ctx.quality_report.as_ref().unwrap();
        assert!(!report.passed);
        assert!(
            report
                .critical_issues
                .iter()
                .any(|i| i.contains("no citations resolved"))
        );
        // exports still produced
        assert!(ctx.storage_result.contains_key("html"));
        assert!(ctx.storage_result.contains_key("json"));
    }

    #[tokio::test]
    async fn test_feedback_prepended_on_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(|_p, schema| {
            let mut article = sample_article_value();
            article["Sources"] = json!("unparseable");
            Ok(dispatch(schema, article))
        }));
        let mut config = Config::default();
        config.export.output_dir = dir.path().to_path_buf();
        let deps = PipelineDeps {
            provider: provider.clone(),
            prober: Arc::new(StaticProber::accept_all()),
            resolver: Arc::new(StaticResolver::new(sample_company(), Vec::new())),
            image_generator: None,
            config,
            timeouts: Default::default(),
        };
        let controller = RegenerationController::new(WorkflowEngine::new(&deps));

        controller.run(sample_job()).await.unwrap();

        let generation_prompts: Vec<String> = provider
            .prompts()
            .into_iter()
            .filter(|p| p.contains("# Assignment"))
            .collect();
        assert_eq!(generation_prompts.len(), 3);
        assert!(!generation_prompts[0].contains("failed quality review"));
        assert!(generation_prompts[1].contains("failed quality review"));
        assert!(generation_prompts[1].contains("no citations resolved"));
    }

    #[tokio::test]
    async fn test_parse_failure_then_recovery() {
        // First generation returns junk below the minimum set; later ones a
        // full article
        let dir = tempfile::tempdir().unwrap();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let provider = ScriptedProvider::new(move |_p, schema| {
            let props = schema.get("properties");
            if props.is_some_and(|p| p.get("Headline").is_some()) {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    Ok(json!({"Headline": "only a headline"}))
                } else {
                    Ok(sample_article_value())
                }
            } else {
                Ok(dispatch(schema, Value::Null))
            }
        });
        let controller = controller_with(provider, dir.path());

        let ctx = controller.run(sample_job()).await.unwrap();
        assert_eq!(ctx.state, RunState::Done, "errors: {:?}", ctx.errors);
        assert_eq!(ctx.regeneration_attempts, 1);
        assert!(ctx.errors.iter().any(|e| e.contains("generation failed")));
    }

    #[tokio::test]
    async fn test_unrecoverable_generation_ends_failed() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::failing("model gone");
        let controller = controller_with(provider, dir.path());

        let ctx = controller.run(sample_job()).await.unwrap();
        assert_eq!(ctx.state, RunState::Failed);
        // budget was spent trying
        assert_eq!(ctx.regeneration_attempts, 2);
        // best-effort export of run metadata
        assert!(ctx.storage_result.contains_key("metadata"));
    }
}
