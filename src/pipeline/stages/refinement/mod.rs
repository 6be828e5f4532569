//! Stage 3 - Quality Refinement
//!
//! AI-only, concurrent, per-field review and AEO enhancement:
//!
//! 1. **Review pass**: every content field is reviewed against the
//!    checklist with a structured return contract, bounded at 15
//!    concurrent calls. Rewrites shorter than half the original are
//!    rejected. Results are collected, then applied in declared field
//!    order.
//! 2. **AEO pass**: a lightweight analysis drives enhancement of up to 7
//!    body sections (10 concurrent calls), plus a focused direct-answer
//!    rewrite.
//! 3. **Dash post-condition**: fields still carrying em-/en-dashes get a
//!    focused second-pass rewrite; anything that survives that is cleaned
//!    deterministically so the zero-tolerance invariant holds.
//!
//! The stage is non-blocking: any failure is logged and the article passes
//! through unchanged.

mod aeo;
mod checklist;

pub use aeo::count_fallback;
pub use checklist::{
    BANNED_PHRASES, BRAND_NAMES, CITATION_PHRASES, CONVERSATIONAL_PHRASES,
    count_citation_phrases, count_conversational_phrases, count_question_patterns,
};

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::ai::provider::{SharedProvider, ToolOptions};
use crate::ai::schema::{ReviewResponse, review_schema, rewrite_schema};
use crate::ai::timeout::{TimeoutConfig, with_timeout};
use crate::constants::{aeo as aeo_constants, concurrency, review};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::text;
use crate::types::{ArticleOutput, ContentField, ForgeError, Result};

pub struct QualityRefinementStage {
    provider: SharedProvider,
    timeouts: TimeoutConfig,
}

impl QualityRefinementStage {
    pub fn new(provider: SharedProvider, timeouts: TimeoutConfig) -> Self {
        Self { provider, timeouts }
    }
}

#[async_trait]
impl Stage for QualityRefinementStage {
    fn number(&self) -> u8 {
        3
    }

    fn name(&self) -> &'static str {
        "quality_refinement"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let original = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(3, "quality_refinement", "no structured data"))?;

        match self.refine(original.clone()).await {
            Ok((article, warnings)) => Ok(StageReport::with_warnings(
                StageOutput::Refined {
                    article,
                    optimized: true,
                },
                warnings,
            )),
            Err(e) => {
                // Non-blocking by contract: pass the article through unchanged
                warn!("Quality refinement failed, passing article through: {}", e);
                Ok(StageReport::with_warnings(
                    StageOutput::Refined {
                        article: original.clone(),
                        optimized: false,
                    },
                    vec![format!("quality refinement skipped: {}", e)],
                ))
            }
        }
    }
}

impl QualityRefinementStage {
    async fn refine(&self, mut article: ArticleOutput) -> Result<(ArticleOutput, Vec<String>)> {
        let mut warnings = Vec::new();

        self.review_pass(&mut article, &mut warnings).await;
        self.aeo_pass(&mut article, &mut warnings).await;
        self.optimize_direct_answer(&mut article, &mut warnings).await;
        self.dash_sweep(&mut article, &mut warnings).await;

        Ok((article, warnings))
    }

    // -------------------------------------------------------------------------
    // Pass 1: per-field review
    // -------------------------------------------------------------------------

    async fn review_pass(&self, article: &mut ArticleOutput, warnings: &mut Vec<String>) {
        // Required fields are reviewed even when empty (empty is itself a
        // quality issue); short optional sections are skipped.
        let targets: Vec<(ContentField, String)> = article
            .content_fields()
            .into_iter()
            .filter_map(|field| {
                let content = article.content(field)?.to_string();
                if !field.is_required() && content.len() < review::OPTIONAL_SKIP_CHARS {
                    return None;
                }
                Some((field, content))
            })
            .collect();

        debug!(fields = targets.len(), "Review pass starting");

        let reviewed: Vec<(ContentField, (Option<String>, Vec<String>))> =
            futures::stream::iter(targets.into_iter().map(|(field, content)| async move {
                (field, self.review_field(field, &content).await)
            }))
            .buffer_unordered(concurrency::REVIEW_CONCURRENCY)
            .collect()
            .await;

        // Collect-then-apply in declared field order, not completion order
        let mut by_field: HashMap<ContentField, (Option<String>, Vec<String>)> =
            reviewed.into_iter().collect();
        for field in ContentField::all() {
            if let Some((new_content, field_warnings)) = by_field.remove(&field) {
                warnings.extend(field_warnings);
                if let Some(content) = new_content {
                    article.set_content(field, content);
                }
            }
        }
    }

    async fn review_field(
        &self,
        field: ContentField,
        content: &str,
    ) -> (Option<String>, Vec<String>) {
        let prompt = checklist::review_prompt(&field.key(), content);
        let result = with_timeout(
            self.timeouts.field_review,
            self.provider
                .generate(&prompt, &review_schema(), ToolOptions::none()),
            "field review",
        )
        .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => return (None, vec![format!("review of {} failed: {}", field, e)]),
        };

        match serde_json::from_value::<ReviewResponse>(response.content) {
            Ok(reviewed) => {
                if accepts_rewrite(content, &reviewed.fixed_content) {
                    if reviewed.issues_fixed > 0 {
                        debug!(
                            field = %field,
                            issues = reviewed.issues_fixed,
                            dashes = reviewed.em_dashes_fixed + reviewed.en_dashes_fixed,
                            "Field reviewed"
                        );
                    }
                    (Some(reviewed.fixed_content), Vec::new())
                } else {
                    (
                        None,
                        vec![format!(
                            "review rewrite for {} rejected: shorter than half the original",
                            field
                        )],
                    )
                }
            }
            Err(e) => (
                None,
                vec![format!("review response for {} unparseable: {}", field, e)],
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Pass 2: AEO enhancement
    // -------------------------------------------------------------------------

    async fn aeo_pass(&self, article: &mut ArticleOutput, warnings: &mut Vec<String>) {
        let analysis = aeo::analyze(
            &self.provider,
            &article.merged_body_text(),
            self.timeouts.field_review,
        )
        .await;
        let gaps = aeo::gaps(&analysis);
        if !gaps.any() {
            debug!("AEO thresholds met; no enhancement needed");
            return;
        }

        let targets: Vec<(ContentField, String)> = (0..article.sections.len())
            .filter_map(|i| {
                let field = ContentField::Section(i);
                let content = article.content(field)?.to_string();
                (!content.trim().is_empty()).then_some((field, content))
            })
            .take(aeo_constants::MAX_ENHANCED_SECTIONS)
            .collect();

        debug!(sections = targets.len(), "AEO enhancement starting");

        let gaps_ref = &gaps;
        let enhanced: Vec<(ContentField, (Option<String>, Vec<String>))> =
            futures::stream::iter(targets.into_iter().map(|(field, content)| async move {
                (field, self.enhance_field(field, &content, gaps_ref).await)
            }))
            .buffer_unordered(concurrency::AEO_CONCURRENCY)
            .collect()
            .await;

        let mut by_field: HashMap<ContentField, (Option<String>, Vec<String>)> =
            enhanced.into_iter().collect();
        for field in ContentField::all() {
            if let Some((new_content, field_warnings)) = by_field.remove(&field) {
                warnings.extend(field_warnings);
                if let Some(content) = new_content {
                    article.set_content(field, content);
                }
            }
        }
    }

    async fn enhance_field(
        &self,
        field: ContentField,
        content: &str,
        gaps: &aeo::AeoGaps,
    ) -> (Option<String>, Vec<String>) {
        let prompt = aeo::enhancement_prompt(&field.key(), content, gaps);
        let result = with_timeout(
            self.timeouts.field_review,
            self.provider
                .generate(&prompt, &rewrite_schema(), ToolOptions::none()),
            "aeo enhancement",
        )
        .await;

        match result {
            Ok(response) => match aeo::fixed_content(&response.content) {
                Some(fixed) if accepts_rewrite(content, &fixed) => (Some(fixed), Vec::new()),
                _ => (
                    None,
                    vec![format!("aeo enhancement for {} rejected", field)],
                ),
            },
            Err(e) => (
                None,
                vec![format!("aeo enhancement for {} failed: {}", field, e)],
            ),
        }
    }

    async fn optimize_direct_answer(
        &self,
        article: &mut ArticleOutput,
        warnings: &mut Vec<String>,
    ) {
        let words = text::word_count(&article.direct_answer);
        let cited = count_citation_phrases(&article.direct_answer) >= 1;
        let in_window = (aeo_constants::DIRECT_ANSWER_MIN_WORDS
            ..=aeo_constants::DIRECT_ANSWER_MAX_WORDS)
            .contains(&words);
        if in_window && cited {
            return;
        }

        let prompt = aeo::direct_answer_prompt(&article.direct_answer);
        let result = with_timeout(
            self.timeouts.field_review,
            self.provider
                .generate(&prompt, &rewrite_schema(), ToolOptions::none()),
            "direct answer optimization",
        )
        .await;

        match result {
            Ok(response) => match aeo::fixed_content(&response.content) {
                Some(fixed)
                    if (aeo_constants::DIRECT_ANSWER_MIN_WORDS
                        ..=aeo_constants::DIRECT_ANSWER_MAX_WORDS)
                        .contains(&text::word_count(&fixed))
                        && count_citation_phrases(&fixed) >= 1 =>
                {
                    article.direct_answer = fixed;
                }
                _ => warnings.push("direct answer optimization rejected".to_string()),
            },
            Err(e) => warnings.push(format!("direct answer optimization failed: {}", e)),
        }
    }

    // -------------------------------------------------------------------------
    // Post-condition: dash sweep
    // -------------------------------------------------------------------------

    async fn dash_sweep(&self, article: &mut ArticleOutput, warnings: &mut Vec<String>) {
        for (dash_char, dash_name) in [('\u{2014}', "em-dash"), ('\u{2013}', "en-dash")] {
            let dirty: Vec<ContentField> = article
                .content_fields()
                .into_iter()
                .filter(|f| {
                    article
                        .content(*f)
                        .is_some_and(|c| c.contains(dash_char))
                })
                .collect();

            for field in dirty {
                let content = match article.content(field) {
                    Some(c) => c.to_string(),
                    None => continue,
                };
                match self.rewrite_dashes(field, &content, dash_name).await {
                    Some(fixed) if !fixed.contains(dash_char) => {
                        article.set_content(field, fixed);
                    }
                    _ => warnings.push(format!(
                        "{} second-pass rewrite failed for {}",
                        dash_name, field
                    )),
                }
            }
        }

        // Deterministic cleanup for anything the model left behind, across
        // every string field (titles and Q&A never go through review).
        let residual: Vec<String> = article
            .string_fields()
            .iter()
            .filter(|(_, value)| text::contains_dashes(value))
            .map(|(key, _)| key.clone())
            .collect();
        if !residual.is_empty() {
            strip_all_dashes(article);
            for key in residual {
                warnings.push(format!("deterministic dash cleanup applied to {}", key));
            }
        }
    }

    async fn rewrite_dashes(
        &self,
        field: ContentField,
        content: &str,
        dash_name: &str,
    ) -> Option<String> {
        let prompt = aeo::dash_rewrite_prompt(&field.key(), content, dash_name);
        let result = with_timeout(
            self.timeouts.field_review,
            self.provider
                .generate(&prompt, &rewrite_schema(), ToolOptions::none()),
            "dash rewrite",
        )
        .await
        .ok()?;
        aeo::fixed_content(&result.content).filter(|fixed| accepts_rewrite(content, fixed))
    }
}

/// Length-sanity acceptance rule for every write-back
fn accepts_rewrite(original: &str, rewritten: &str) -> bool {
    rewritten.len() as f64 >= review::MIN_LENGTH_RATIO * original.len() as f64
}

/// Apply the deterministic dash replacement to every string field
fn strip_all_dashes(article: &mut ArticleOutput) {
    let fix = |s: &mut String| {
        if text::contains_dashes(s) {
            *s = text::strip_dashes(s);
        }
    };
    fix(&mut article.headline);
    fix(&mut article.subtitle);
    fix(&mut article.teaser);
    fix(&mut article.meta_title);
    fix(&mut article.meta_description);
    fix(&mut article.intro);
    fix(&mut article.direct_answer);
    for section in &mut article.sections {
        fix(&mut section.title);
        fix(&mut section.content);
    }
    for qa in article.faqs.iter_mut().chain(article.paa.iter_mut()) {
        fix(&mut qa.question);
        fix(&mut qa.answer);
    }
    for takeaway in &mut article.key_takeaways {
        fix(takeaway);
    }
    fix(&mut article.sources);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, sample_article_value, sample_job};
    use serde_json::json;
    use std::sync::Arc;

    fn article() -> ArticleOutput {
        ArticleOutput::from_llm_value(&sample_article_value())
            .unwrap()
            .0
    }

    fn ctx_with(article: ArticleOutput) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(sample_job());
        ctx.structured_data = Some(article);
        ctx
    }

    /// Provider whose rewrites are always long enough to be accepted
    fn generous_provider() -> ScriptedProvider {
        let long = format!(
            "<p>{}</p>",
            "According to research, you can verify every request. ".repeat(40)
        );
        ScriptedProvider::new(move |_prompt, _schema| {
            Ok(json!({"fixed_content": long.clone(), "issues_fixed": 1}))
        })
    }

    #[tokio::test]
    async fn test_refinement_never_propagates_errors() {
        let provider = Arc::new(ScriptedProvider::failing("provider down"));
        let stage = QualityRefinementStage::new(provider, TimeoutConfig::default());
        let ctx = ctx_with(article());

        let report = stage.execute(&ctx).await.unwrap();
        let StageOutput::Refined { article: out, .. } = report.output else {
            panic!("expected refined output");
        };
        // article passes through; per-field failures became warnings
        assert_eq!(out.headline, article().headline);
        assert!(!report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_short_rewrites() {
        let provider = Arc::new(ScriptedProvider::returning(
            json!({"fixed_content": "x", "issues_fixed": 1}),
        ));
        let stage = QualityRefinementStage::new(provider, TimeoutConfig::default());
        let ctx = ctx_with(article());

        let report = stage.execute(&ctx).await.unwrap();
        let StageOutput::Refined { article: out, .. } = report.output else {
            panic!("expected refined output");
        };
        // the one-character rewrite must not replace real content
        assert!(out.intro.len() > 10);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("shorter than half"))
        );
    }

    #[tokio::test]
    async fn test_optional_short_sections_skipped() {
        let mut base = article();
        base.sections.push(crate::types::Section {
            title: "Optional".into(),
            content: "<p>short</p>".into(),
        });
        let provider = Arc::new(ScriptedProvider::failing("down"));
        let stage = QualityRefinementStage::new(provider, TimeoutConfig::default());
        let report = stage.execute(&ctx_with(base)).await.unwrap();

        // no warning mentions the optional 7th section: it was never reviewed
        assert!(
            !report
                .warnings
                .iter()
                .any(|w| w.contains("section_07_content"))
        );
    }

    #[tokio::test]
    async fn test_dash_sweep_deterministic_fallback() {
        // Model echoes content back unchanged, so the focused rewrite fails
        // and the deterministic cleanup must fire.
        let provider = Arc::new(ScriptedProvider::new(|_prompt, _schema| {
            Ok(json!({"fixed_content": "", "issues_fixed": 0}))
        }));
        let stage = QualityRefinementStage::new(provider, TimeoutConfig::default());

        let mut dirty = article();
        dirty.intro = "<p>AI\u{2014}a revolution \u{2014} today</p>".to_string();
        let report = stage.execute(&ctx_with(dirty)).await.unwrap();
        let StageOutput::Refined { article: out, .. } = report.output else {
            panic!("expected refined output");
        };

        assert!(!text::contains_dashes(&out.intro));
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("deterministic dash cleanup"))
        );
    }

    #[tokio::test]
    async fn test_stage_3_sets_optimized_flag() {
        let provider = Arc::new(generous_provider());
        let stage = QualityRefinementStage::new(provider, TimeoutConfig::default());
        let report = stage.execute(&ctx_with(article())).await.unwrap();
        let StageOutput::Refined { optimized, .. } = report.output else {
            panic!("expected refined output");
        };
        assert!(optimized);
    }
}
