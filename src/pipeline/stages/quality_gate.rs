//! Stage 10 - Quality Gate
//!
//! Computes the weighted AEO score, enforces the hard invariants, and sets
//! the `passed` flag the regeneration controller acts on. This stage never
//! raises; it reports.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::constants::{aeo, pipeline as pipeline_constants, scoring};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::pipeline::stages::refinement::{
    count_citation_phrases, count_conversational_phrases,
};
use crate::text;
use crate::types::article::ValidatedArticle;
use crate::types::{ContentField, QualityReport, Result, SubScores};

pub struct QualityGateStage {
    freshness_window_days: i64,
}

impl QualityGateStage {
    pub fn new(freshness_window_days: i64) -> Self {
        Self {
            freshness_window_days,
        }
    }
}

impl Default for QualityGateStage {
    fn default() -> Self {
        Self::new(pipeline_constants::FRESHNESS_WINDOW_DAYS)
    }
}

#[async_trait]
impl Stage for QualityGateStage {
    fn number(&self) -> u8 {
        10
    }

    fn name(&self) -> &'static str {
        "quality_gate"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let report = match &ctx.validated_article {
            Some(article) => self.evaluate(article),
            None => QualityReport {
                aeo_score: 0.0,
                sub_scores: SubScores::default(),
                critical_issues: vec!["no validated article to evaluate".to_string()],
                warnings: Vec::new(),
                passed: false,
            },
        };

        info!("Quality gate: {}", report.summary());
        Ok(StageReport::new(StageOutput::Quality(report)))
    }
}

impl QualityGateStage {
    fn evaluate(&self, article: &ValidatedArticle) -> QualityReport {
        let mut warnings = Vec::new();

        let sub_scores = SubScores {
            direct_answer: score_direct_answer(article),
            qa_format: score_qa_format(article),
            citations: score_citations(article),
            natural_language: score_natural_language(article),
            structure: score_structure(article),
            eeat: self.score_eeat(article),
        };
        let aeo_score = sub_scores.composite();

        let critical_issues = check_invariants(article);

        // Light HTML validation: flag, never fail
        for field in ContentField::all() {
            if let Some(html) = str_field(article, &field.key()) {
                for issue in text::check_tag_balance(html) {
                    warnings.push(format!("{}: {}", field.key(), issue));
                }
            }
        }

        let passed = critical_issues.is_empty() && aeo_score >= scoring::PASS_MARK;
        QualityReport {
            aeo_score,
            sub_scores,
            critical_issues,
            warnings,
            passed,
        }
    }

    fn score_eeat(&self, article: &ValidatedArticle) -> f64 {
        let metadata = article.get("metadata");
        let get = |key: &str| -> Option<String> {
            metadata?
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        let mut score = 0.0;
        if get("author").is_some() {
            score += 30.0;
        }
        if get("organization").is_some() {
            score += 30.0;
        }
        if let Some(date) = get("publication_date") {
            match chrono::DateTime::parse_from_rfc3339(&date) {
                Ok(parsed) => {
                    let age = chrono::Utc::now()
                        .signed_duration_since(parsed.with_timezone(&chrono::Utc));
                    if age.num_days() <= self.freshness_window_days && age.num_seconds() >= 0 {
                        score += 40.0;
                    } else {
                        score += 20.0;
                    }
                }
                Err(_) => score += 10.0,
            }
        }
        score
    }
}

// =============================================================================
// Sub-scores (each on the 0..=100 scale)
// =============================================================================

fn str_field<'a>(article: &'a ValidatedArticle, key: &str) -> Option<&'a str> {
    article.get(key).and_then(|v| v.as_str())
}

/// Body HTML fields in declared order
fn body_fields(article: &ValidatedArticle) -> Vec<&str> {
    ContentField::all()
        .iter()
        .filter_map(|f| str_field(article, &f.key()))
        .filter(|html| !html.trim().is_empty())
        .collect()
}

/// Paragraph chunks across the body fields
fn paragraphs(article: &ValidatedArticle) -> Vec<String> {
    let mut chunks = Vec::new();
    for html in body_fields(article) {
        for chunk in html.split("</p>") {
            if let Some(start) = chunk.rfind("<p") {
                let paragraph = &chunk[start..];
                if !text::strip_html(paragraph).trim().is_empty() {
                    chunks.push(paragraph.to_string());
                }
            }
        }
    }
    chunks
}

fn score_direct_answer(article: &ValidatedArticle) -> f64 {
    let Some(answer) = str_field(article, "Direct_Answer").filter(|s| !s.trim().is_empty())
    else {
        return 0.0;
    };
    let words = text::word_count(answer);
    let mut score = 0.0;
    if (aeo::DIRECT_ANSWER_MIN_WORDS..=aeo::DIRECT_ANSWER_MAX_WORDS).contains(&words) {
        score += 50.0;
    } else if (30..=80).contains(&words) {
        score += 25.0;
    }
    let citations =
        count_citation_phrases(answer) + answer.matches("class=\"citation\"").count();
    if citations >= 1 {
        score += 50.0;
    }
    score
}

fn score_qa_format(article: &ValidatedArticle) -> f64 {
    let faq_count = article
        .get("faq")
        .and_then(|v| v.as_array())
        .map_or(0, |a| a.len());
    let paa_count = article
        .get("paa")
        .and_then(|v| v.as_array())
        .map_or(0, |a| a.len());
    let question_titles = (1..=9)
        .filter_map(|i| str_field(article, &format!("section_{:02}_title", i)))
        .filter(|title| title.trim_end().ends_with('?'))
        .count();

    let faq_score = (faq_count as f64 / 5.0).min(1.0) * 40.0;
    let paa_score = (paa_count as f64 / 3.0).min(1.0) * 30.0;
    let title_score = (question_titles as f64 / 2.0).min(1.0) * 30.0;
    faq_score + paa_score + title_score
}

fn score_citations(article: &ValidatedArticle) -> f64 {
    let paragraphs = paragraphs(article);
    if paragraphs.is_empty() {
        return 0.0;
    }
    let cited = paragraphs
        .iter()
        .filter(|p| {
            let natural = count_citation_phrases(&text::strip_html(p));
            let anchors = p.matches("class=\"citation\"").count();
            natural + anchors >= 2
        })
        .count();
    let ratio = cited as f64 / paragraphs.len() as f64;
    (ratio / scoring::CITED_PARAGRAPH_RATIO).min(1.0) * 100.0
}

fn score_natural_language(article: &ValidatedArticle) -> f64 {
    let body: String = body_fields(article)
        .iter()
        .map(|html| text::strip_html(html))
        .collect::<Vec<_>>()
        .join("\n");
    let count = count_conversational_phrases(&body);
    (count as f64 / aeo::MIN_CONVERSATIONAL as f64).min(1.0) * 100.0
}

fn score_structure(article: &ValidatedArticle) -> f64 {
    let titled_sections = (1..=9)
        .filter_map(|i| str_field(article, &format!("section_{:02}_title", i)))
        .filter(|t| !t.trim().is_empty())
        .count();
    let body = body_fields(article).join("\n");
    let has_list = body.contains("<ul") || body.contains("<ol");
    let has_table = article
        .get("tables")
        .and_then(|v| v.as_array())
        .is_some_and(|a| !a.is_empty());

    let mut score = 0.0;
    if titled_sections >= 3 {
        score += 40.0;
    } else if titled_sections >= 1 {
        score += 20.0;
    }
    if has_list {
        score += 40.0;
    }
    if has_table {
        score += 20.0;
    }
    score
}

// =============================================================================
// Hard invariants
// =============================================================================

fn check_invariants(article: &ValidatedArticle) -> Vec<String> {
    let mut issues = Vec::new();

    // No em-dash or en-dash anywhere in any string value
    let mut dash_fields = Vec::new();
    for (key, value) in article.iter() {
        scan_value(value, key, &mut dash_fields);
    }
    if !dash_fields.is_empty() {
        issues.push(format!("dash characters present in: {}", dash_fields.join(", ")));
    }

    // Every remaining [N] in HTML resolves via _citation_map
    let empty = serde_json::Map::new();
    let citation_map = article
        .get("_citation_map")
        .and_then(|v| v.as_object())
        .unwrap_or(&empty);
    for field in ContentField::all() {
        if let Some(html) = str_field(article, &field.key()) {
            let unresolved: Vec<u32> = text::markers_outside_anchors(html)
                .into_iter()
                .filter(|n| !citation_map.contains_key(&n.to_string()))
                .collect();
            if !unresolved.is_empty() {
                issues.push(format!(
                    "unresolved citation markers {:?} in {}",
                    unresolved,
                    field.key()
                ));
            }
        }
    }

    if citation_map.is_empty() {
        issues.push("no citations resolved".to_string());
    }

    // Plain-text fields are tag-free
    for key in plain_text_keys(article) {
        if let Some(value) = str_field(article, &key)
            && text::contains_html(value)
        {
            issues.push(format!("plain-text field {} contains HTML", key));
        }
    }

    // Minimum content: headline plus one full section pair
    if str_field(article, "Headline").is_none_or(|h| h.trim().is_empty()) {
        issues.push("Headline is empty".to_string());
    }
    let has_section = (1..=9).any(|i| {
        let title = str_field(article, &format!("section_{:02}_title", i));
        let content = str_field(article, &format!("section_{:02}_content", i));
        title.is_some_and(|t| !t.trim().is_empty())
            && content.is_some_and(|c| !c.trim().is_empty())
    });
    if !has_section {
        issues.push("no non-empty section pair".to_string());
    }

    issues
}

fn plain_text_keys(article: &ValidatedArticle) -> Vec<String> {
    let mut keys = vec![
        "Headline".to_string(),
        "Subtitle".to_string(),
        "Teaser".to_string(),
        "Meta_Title".to_string(),
        "Meta_Description".to_string(),
    ];
    for key in article.keys() {
        if key.ends_with("_title") && key.starts_with("section_")
            || key.starts_with("faq_")
            || key.starts_with("paa_")
            || key.starts_with("key_takeaway_")
        {
            keys.push(key.clone());
        }
    }
    keys
}

/// Recursively collect the JSON paths of string values containing dashes
fn scan_value(value: &Value, path: &str, found: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if text::contains_dashes(s) {
                found.push(path.to_string());
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan_value(item, &format!("{}[{}]", path, i), found);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                scan_value(item, &format!("{}.{}", path, key), found);
            }
        }
        _ => {}
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::results::{CitationsResult, MetadataResult};
    use crate::pipeline::stage::StageOutput as Output;
    use crate::pipeline::stages::merge::MergeLinkStage;
    use crate::testing::{sample_article_value, sample_job};
    use crate::types::{ArticleOutput, Citation, CitationMap};

    /// Run the real merge stage to get a validated article, then gate it
    async fn gated_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(sample_job());
        let (article, _) = ArticleOutput::from_llm_value(&sample_article_value()).unwrap();
        ctx.structured_data = Some(article);

        let mut map = CitationMap::new();
        for (n, url, title) in [
            (1u32, "https://example.org/nist-zta", "NIST publication"),
            (2, "https://example.org/industry-report", "Industry report"),
        ] {
            map.insert(
                n,
                Citation {
                    url: url.into(),
                    title: title.into(),
                    kind: "source".into(),
                },
            );
        }
        ctx.parallel_results.citations = Some(CitationsResult {
            map,
            html: String::new(),
        });
        ctx.parallel_results.metadata = Some(MetadataResult {
            word_count: 1600,
            reading_time_minutes: 8,
            publication_date: chrono::Utc::now().to_rfc3339(),
            author: "Example Editorial Team".into(),
            organization: "Example".into(),
            canonical_url: "https://example.com/blog/zero-trust".into(),
        });

        let report = MergeLinkStage::new().execute(&ctx).await.unwrap();
        if let Output::Merged(flat) = report.output {
            ctx.validated_article = Some(flat);
        }
        ctx
    }

    #[tokio::test]
    async fn test_well_formed_article_passes() {
        let ctx = gated_ctx().await;
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(
            quality.critical_issues.is_empty(),
            "unexpected critical issues: {:?}",
            quality.critical_issues
        );
        assert!(
            quality.aeo_score >= scoring::PASS_MARK,
            "score too low: {} ({:?})",
            quality.aeo_score,
            quality.sub_scores
        );
        assert!(quality.passed);
    }

    #[tokio::test]
    async fn test_dashes_are_critical() {
        let mut ctx = gated_ctx().await;
        if let Some(article) = &mut ctx.validated_article {
            article.insert(
                "Intro".into(),
                Value::String("<p>AI\u{2014}a revolution</p>".into()),
            );
        }
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(!quality.passed);
        assert!(
            quality
                .critical_issues
                .iter()
                .any(|i| i.contains("dash characters"))
        );
    }

    #[tokio::test]
    async fn test_unresolved_marker_is_critical() {
        let mut ctx = gated_ctx().await;
        if let Some(article) = &mut ctx.validated_article {
            article.insert(
                "Intro".into(),
                Value::String("<p>claim [9] here</p>".into()),
            );
        }
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(!quality.passed);
        assert!(
            quality
                .critical_issues
                .iter()
                .any(|i| i.contains("unresolved citation markers"))
        );
    }

    #[tokio::test]
    async fn test_html_in_plain_text_field_is_critical() {
        let mut ctx = gated_ctx().await;
        if let Some(article) = &mut ctx.validated_article {
            article.insert(
                "Headline".into(),
                Value::String("<b>Bold</b> headline".into()),
            );
        }
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(!quality.passed);
        assert!(
            quality
                .critical_issues
                .iter()
                .any(|i| i.contains("contains HTML"))
        );
    }

    #[tokio::test]
    async fn test_empty_citation_map_is_critical() {
        let mut ctx = gated_ctx().await;
        if let Some(article) = &mut ctx.validated_article {
            article.insert("_citation_map".into(), Value::Object(Default::default()));
            // remove the anchors so no unresolved-marker noise: rewrite body
            article.insert("Intro".into(), Value::String("<p>plain</p>".into()));
        }
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(!quality.passed);
        assert!(
            quality
                .critical_issues
                .iter()
                .any(|i| i.contains("no citations resolved"))
        );
    }

    #[tokio::test]
    async fn test_missing_article_reports_not_raises() {
        let ctx = ExecutionContext::new(sample_job());
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(!quality.passed);
        assert_eq!(quality.aeo_score, 0.0);
    }

    #[tokio::test]
    async fn test_tag_imbalance_is_warning_not_critical() {
        let mut ctx = gated_ctx().await;
        if let Some(article) = &mut ctx.validated_article {
            article.insert(
                "section_06_content".into(),
                Value::String("<p>unclosed paragraph".into()),
            );
        }
        let report = QualityGateStage::default().execute(&ctx).await.unwrap();
        let Output::Quality(quality) = report.output else {
            panic!("expected quality output");
        };
        assert!(quality.warnings.iter().any(|w| w.contains("unclosed tag")));
        assert!(
            !quality
                .critical_issues
                .iter()
                .any(|i| i.contains("unclosed"))
        );
    }
}
