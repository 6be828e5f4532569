//! Stage 2 - Generation
//!
//! One schema-bound LLM call with search and URL-context grounding. The
//! structured return goes through JSON repair and best-effort partial
//! recovery; only a missing minimum field set fails the stage (and hands
//! control to the regeneration budget).

use async_trait::async_trait;
use tracing::{debug, info};

use crate::ai::provider::{SharedProvider, ToolOptions};
use crate::ai::schema::article_schema;
use crate::ai::timeout::{TimeoutConfig, with_timeout};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::{ArticleOutput, ForgeError, Result};

pub struct GenerationStage {
    provider: SharedProvider,
    timeouts: TimeoutConfig,
}

impl GenerationStage {
    pub fn new(provider: SharedProvider, timeouts: TimeoutConfig) -> Self {
        Self { provider, timeouts }
    }
}

#[async_trait]
impl Stage for GenerationStage {
    fn number(&self) -> u8 {
        2
    }

    fn name(&self) -> &'static str {
        "generation"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let base_prompt = ctx
            .prompt_text
            .as_ref()
            .ok_or_else(|| ForgeError::stage(2, "generation", "prompt not built"))?;

        // Regeneration feedback is prepended so it outranks the base contract
        let prompt = match &ctx.review_feedback {
            Some(feedback) => format!(
                "IMPORTANT - the previous attempt failed quality review:\n{}\n\n{}",
                feedback, base_prompt
            ),
            None => base_prompt.clone(),
        };

        let schema = article_schema();
        let response = with_timeout(
            self.timeouts.llm_request,
            self.provider.generate(&prompt, &schema, ToolOptions::grounded()),
            "article generation",
        )
        .await?;

        let mut warnings = Vec::new();
        if response.grounding_count == 0 {
            warnings.push("generation reported no grounding metadata".to_string());
        } else {
            debug!(
                grounding_count = response.grounding_count,
                "Search grounding confirmed"
            );
        }

        let (article, recovery_warnings) = ArticleOutput::from_llm_value(&response.content)?;
        warnings.extend(recovery_warnings);

        info!(
            sections = article.sections.len(),
            faqs = article.faqs.len(),
            tokens = response.usage.total(),
            "Article generated"
        );
        Ok(StageReport::with_warnings(
            StageOutput::Article(article),
            warnings,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, JobConfig};
    use crate::testing::ScriptedProvider;
    use std::sync::Arc;

    fn ctx_with_prompt() -> ExecutionContext {
        let config = Config::default();
        let mut ctx = ExecutionContext::new(JobConfig::new(
            &config,
            "zero trust architecture",
            "https://example.com",
        ));
        ctx.prompt_text = Some("write the article".to_string());
        ctx
    }

    #[tokio::test]
    async fn test_generation_produces_article() {
        let provider = Arc::new(ScriptedProvider::returning_article());
        let stage = GenerationStage::new(provider, TimeoutConfig::default());
        let report = stage.execute(&ctx_with_prompt()).await.unwrap();
        let StageOutput::Article(article) = report.output else {
            panic!("expected article output");
        };
        assert!(!article.headline.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_prepended_on_regeneration() {
        let provider = Arc::new(ScriptedProvider::returning_article());
        let stage = GenerationStage::new(provider.clone(), TimeoutConfig::default());
        let mut ctx = ctx_with_prompt();
        ctx.review_feedback = Some("remove all dashes".to_string());
        stage.execute(&ctx).await.unwrap();

        let prompts = provider.prompts();
        assert!(prompts[0].starts_with("IMPORTANT"));
        assert!(prompts[0].contains("remove all dashes"));
        assert!(prompts[0].contains("write the article"));
    }

    #[tokio::test]
    async fn test_partial_payload_below_minimum_fails() {
        let provider = Arc::new(ScriptedProvider::returning(serde_json::json!({
            "Headline": "only a headline"
        })));
        let stage = GenerationStage::new(provider, TimeoutConfig::default());
        let err = stage.execute(&ctx_with_prompt()).await.unwrap_err();
        assert!(err.to_string().contains("minimum field set"));
    }
}
