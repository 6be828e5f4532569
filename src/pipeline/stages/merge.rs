//! Stage 8 - Merge and Link
//!
//! Deterministic, minimal-transformation assembly of the parallel stage
//! outputs into the validated article. Its only transformations are
//! merging, citation linkification, and entity-safing; any content
//! manipulation here is a regression.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::pipeline::context::ExecutionContext;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::text;
use crate::types::article::ValidatedArticle;
use crate::types::{CitationMap, ContentField, ForgeError, Result};

pub struct MergeLinkStage;

impl MergeLinkStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MergeLinkStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for MergeLinkStage {
    fn number(&self) -> u8 {
        8
    }

    fn name(&self) -> &'static str {
        "merge_link"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(8, "merge_link", "no structured data"))?;

        let mut warnings = Vec::new();
        let mut flat: ValidatedArticle = article.to_flat_map();

        // 1. Apply the internal-links stage's rewritten sections (its own
        //    parallel contribution; the source article was never mutated)
        if let Some(links) = &ctx.parallel_results.internal_links {
            for (key, rewritten) in &links.linked_sections {
                if flat.contains_key(key) {
                    flat.insert(key.clone(), Value::String(rewritten.clone()));
                }
            }
        }

        // 2. Citation linkification + entity encoding on every HTML field
        let citation_map: CitationMap = ctx
            .parallel_results
            .citations
            .as_ref()
            .map(|c| c.map.clone())
            .unwrap_or_default();

        for field in ContentField::all() {
            let key = field.key();
            let Some(Value::String(html)) = flat.get(&key) else {
                continue;
            };
            let unresolved = text::unresolved_markers(html, &citation_map);
            if !unresolved.is_empty() {
                warnings.push(format!(
                    "removed unresolved citation markers {:?} in {}",
                    unresolved, key
                ));
            }
            let linked = text::linkify(html, &citation_map);
            let encoded = text::encode_entities(&linked);
            flat.insert(key, Value::String(encoded));
        }

        // 3. Merge the parallel contributions at fixed keys
        flat.insert(
            "_citation_map".into(),
            citation_map_value(&citation_map),
        );
        flat.insert(
            "citations_html".into(),
            Value::String(
                ctx.parallel_results
                    .citations
                    .as_ref()
                    .map(|c| c.html.clone())
                    .unwrap_or_default(),
            ),
        );
        flat.insert(
            "internal_links".into(),
            ctx.parallel_results
                .internal_links
                .as_ref()
                .map(|links| {
                    serde_json::json!({
                        "links": links.links,
                        "html": links.html,
                    })
                })
                .unwrap_or_else(|| serde_json::json!({"links": [], "html": ""})),
        );
        flat.insert(
            "toc".into(),
            ctx.parallel_results
                .toc
                .as_ref()
                .map(|toc| serde_json::to_value(&toc.entries).unwrap_or(Value::Array(vec![])))
                .unwrap_or(Value::Array(vec![])),
        );
        flat.insert(
            "metadata".into(),
            ctx.parallel_results
                .metadata
                .as_ref()
                .map(|meta| serde_json::to_value(meta).unwrap_or(Value::Null))
                .unwrap_or(Value::Null),
        );
        flat.insert(
            "image_urls".into(),
            ctx.parallel_results
                .images
                .as_ref()
                .map(|images| serde_json::to_value(&images.images).unwrap_or(Value::Null))
                .unwrap_or_else(|| Value::Object(Map::new())),
        );
        flat.insert(
            "faq".into(),
            serde_json::to_value(&article.faqs).unwrap_or(Value::Array(vec![])),
        );
        flat.insert(
            "paa".into(),
            serde_json::to_value(&article.paa).unwrap_or(Value::Array(vec![])),
        );

        Ok(StageReport::with_warnings(
            StageOutput::Merged(flat),
            warnings,
        ))
    }
}

/// `_citation_map` as a JSON object keyed by marker number
fn citation_map_value(map: &CitationMap) -> Value {
    let mut object = Map::new();
    for (n, citation) in map {
        object.insert(
            n.to_string(),
            serde_json::json!({
                "url": citation.url,
                "title": citation.title,
                "kind": citation.kind,
            }),
        );
    }
    Value::Object(object)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::results::{CitationsResult, InternalLinksResult};
    use crate::testing::{sample_article_value, sample_job};
    use crate::types::{ArticleOutput, Citation};
    use std::collections::BTreeMap;

    fn base_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(sample_job());
        let (article, _) = ArticleOutput::from_llm_value(&sample_article_value()).unwrap();
        ctx.structured_data = Some(article);

        let mut map = CitationMap::new();
        map.insert(
            1,
            Citation {
                url: "https://example.org/nist-zta".into(),
                title: "NIST zero trust publication".into(),
                kind: "source".into(),
            },
        );
        map.insert(
            2,
            Citation {
                url: "https://example.org/industry-report".into(),
                title: "Industry adoption report".into(),
                kind: "source".into(),
            },
        );
        ctx.parallel_results.citations = Some(CitationsResult {
            map,
            html: "<ul class=\"sources\"></ul>".into(),
        });
        ctx
    }

    #[tokio::test]
    async fn test_markers_become_citation_anchors() {
        let ctx = base_ctx();
        let report = MergeLinkStage::new().execute(&ctx).await.unwrap();
        let StageOutput::Merged(flat) = report.output else {
            panic!("expected merged output");
        };

        let intro = flat["Intro"].as_str().unwrap();
        assert!(intro.contains("class=\"citation\""));
        assert!(text::markers_outside_anchors(intro).is_empty());
        assert!(flat["_citation_map"]["1"]["url"].is_string());
    }

    #[tokio::test]
    async fn test_unmapped_markers_removed_with_warning() {
        let mut ctx = base_ctx();
        // empty the map: every marker must be removed
        ctx.parallel_results.citations = Some(CitationsResult::default());
        let report = MergeLinkStage::new().execute(&ctx).await.unwrap();
        let StageOutput::Merged(flat) = report.output else {
            panic!("expected merged output");
        };

        for field in ContentField::all() {
            if let Some(Value::String(html)) = flat.get(&field.key()) {
                assert!(text::markers_outside_anchors(html).is_empty());
            }
        }
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("unresolved citation markers"))
        );
    }

    #[tokio::test]
    async fn test_linked_sections_applied() {
        let mut ctx = base_ctx();
        let mut linked = BTreeMap::new();
        linked.insert(
            "section_01_content".to_string(),
            "<p>rewritten with <a href=\"https://example.com/x\">a link</a> [1]</p>".to_string(),
        );
        ctx.parallel_results.internal_links = Some(InternalLinksResult {
            links: vec![],
            html: String::new(),
            linked_sections: linked,
        });

        let report = MergeLinkStage::new().execute(&ctx).await.unwrap();
        let StageOutput::Merged(flat) = report.output else {
            panic!("expected merged output");
        };
        let section = flat["section_01_content"].as_str().unwrap();
        assert!(section.contains("rewritten with"));
        // the [1] marker in the rewritten content was linkified too
        assert!(section.contains("class=\"citation\""));
    }

    #[tokio::test]
    async fn test_merge_is_deterministic_and_idempotent_at_fixed_inputs() {
        let ctx = base_ctx();
        let stage = MergeLinkStage::new();

        let StageOutput::Merged(first) = stage.execute(&ctx).await.unwrap().output else {
            panic!("expected merged output");
        };
        let StageOutput::Merged(second) = stage.execute(&ctx).await.unwrap().output else {
            panic!("expected merged output");
        };
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_entities_encoded_in_text_runs() {
        let mut ctx = base_ctx();
        if let Some(article) = &mut ctx.structured_data {
            article.intro = "<p>R&D teams and <a href=\"/x?a=1&b=2\">links</a></p>".to_string();
        }
        let report = MergeLinkStage::new().execute(&ctx).await.unwrap();
        let StageOutput::Merged(flat) = report.output else {
            panic!("expected merged output");
        };
        let intro = flat["Intro"].as_str().unwrap();
        assert!(intro.contains("R&amp;D"));
        assert!(intro.contains("href=\"/x?a=1&b=2\""));
    }
}
