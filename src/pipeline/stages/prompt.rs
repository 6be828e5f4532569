//! Stage 1 - Prompt Build
//!
//! Composes the generation prompt from the job inputs and company context.
//! The structure contract here mirrors the article schema; the writing
//! rules encode the AEO requirements the quality gate scores later.

use async_trait::async_trait;

use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::{CompanyContext, ForgeError, Result};

pub struct PromptStage;

impl PromptStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PromptStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for PromptStage {
    fn number(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "prompt_build"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let company = ctx
            .company_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(1, "prompt_build", "company data not resolved"))?;

        let prompt = build_generation_prompt(ctx, company);
        Ok(StageReport::new(StageOutput::Prompt(prompt)))
    }
}

fn build_generation_prompt(ctx: &ExecutionContext, company: &CompanyContext) -> String {
    let job = &ctx.job_config;
    let mut prompt = String::with_capacity(4096);

    // Role and objective
    prompt.push_str(
        "You are an expert content writer producing a long-form, research-backed \
         blog article optimized for both search engines and AI answer engines.\n\n",
    );

    // Company voice
    prompt.push_str("# Company\n\n");
    prompt.push_str(&format!("**Name**: {}\n", company.name));
    prompt.push_str(&format!("**Website**: {}\n", company.url));
    if !company.description.is_empty() {
        prompt.push_str(&format!("**About**: {}\n", company.description));
    }
    prompt.push_str(&format!("**Tone**: {}\n", company.tone));
    prompt.push_str(&format!("**Language**: {}\n", company.language));
    prompt.push_str(&format!("**Market**: {}\n\n", company.market));

    // Assignment
    prompt.push_str("# Assignment\n\n");
    prompt.push_str(&format!("**Primary keyword**: {}\n", job.primary_keyword));
    prompt.push_str(&format!(
        "**Target length**: about {} words across all sections\n\n",
        job.word_count_target
    ));

    // Research requirements
    prompt.push_str("# Research\n\n");
    prompt.push_str(
        "Use web search to ground every factual claim in a real, current source. \
         Collect the sources you used and list them under `Sources`, one per line, \
         formatted exactly as `[N]: URL - short description`. Reference sources in \
         body text with natural-language attributions (\"according to ...\", \
         \"a 2024 study by ... found\") followed by the numeric marker, e.g. `[2]`.\n\n",
    );

    // Structure contract
    prompt.push_str("# Structure\n\n");
    prompt.push_str(
        "- `Headline`: 50-60 characters, plain text, includes the primary keyword\n\
         - `Subtitle`: 80-100 characters, plain text\n\
         - `Meta_Title` (<= 60 chars) and `Meta_Description` (100-160 chars), plain text\n\
         - `Intro`: HTML, 80-120 words\n\
         - `Direct_Answer`: HTML, 40-60 words, answers the keyword question directly \
           and includes one natural-language citation\n\
         - Six to nine sections (`section_NN_title` / `section_NN_content`): titles in \
           plain text with at least two phrased as questions; content in HTML, 3-5 \
           paragraphs of 60-100 words each, using <p>, <ul>/<ol>, <strong> only\n\
         - At least 5 FAQ pairs and 3 People-Also-Ask pairs, plain text\n\
         - Three `key_takeaway_NN` lines, plain text\n\
         - Optional comparison tables under `tables`\n\n",
    );

    // Writing rules
    prompt.push_str("# Writing rules\n\n");
    prompt.push_str(
        "- Write conversationally; address the reader as \"you\"\n\
         - Never use em-dashes or en-dashes; use a comma or ` - ` instead\n\
         - No academic filler (\"delve into\", \"in today's digital age\", \
           \"crucial to note\", \"seamlessly\", \"leverage\" as a verb)\n\
         - Sentence-case headings; keep brand names correctly capitalized\n\
         - Prefer short paragraphs and scannable lists\n\n",
    );

    if let Some(instructions) = &job.custom_instructions {
        prompt.push_str("# Additional instructions\n\n");
        prompt.push_str(instructions);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Return the article in the required JSON structure.\n");
    prompt
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, JobConfig};

    fn ctx_with_company() -> ExecutionContext {
        let config = Config::default();
        let mut job = JobConfig::new(&config, "zero trust architecture", "https://example.com");
        job.custom_instructions = Some("Mention the 2024 framework update.".to_string());
        let mut ctx = ExecutionContext::new(job);
        ctx.company_data = Some(CompanyContext {
            name: "Example".into(),
            url: "https://example.com".into(),
            domain: "example.com".into(),
            description: "Identity security vendor.".into(),
            tone: "direct".into(),
            language: "en".into(),
            market: "global".into(),
            competitors: vec![],
        });
        ctx
    }

    #[tokio::test]
    async fn test_prompt_carries_keyword_and_instructions() {
        let ctx = ctx_with_company();
        let report = PromptStage::new().execute(&ctx).await.unwrap();
        let StageOutput::Prompt(prompt) = report.output else {
            panic!("expected prompt output");
        };
        assert!(prompt.contains("zero trust architecture"));
        assert!(prompt.contains("Mention the 2024 framework update."));
        assert!(prompt.contains("[N]: URL - short description"));
    }

    #[tokio::test]
    async fn test_missing_company_is_stage_error() {
        let config = Config::default();
        let ctx = ExecutionContext::new(JobConfig::new(&config, "kw", "https://example.com"));
        assert!(PromptStage::new().execute(&ctx).await.is_err());
    }
}
