//! Article Output Types
//!
//! Typed record for the generation stage's structured return, extraction
//! from the LLM's flat key map with best-effort partial recovery, and the
//! flat-mapping view the merge stage builds the validated article from.
//!
//! Plain-text fields are stripped of HTML at extraction time; HTML fields
//! are carried as-is and sanitized by the downstream stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text;
use crate::types::{ForgeError, Result};

/// The final article as a flat mapping: the structured article plus the
/// merged parallel-stage keys (`_citation_map`, `citations_html`, ...).
pub type ValidatedArticle = Map<String, Value>;

/// Maximum number of body sections
pub const MAX_SECTIONS: usize = 9;

/// Sections 1..=6 are required by content quality; 7..=9 are optional
pub const REQUIRED_SECTIONS: usize = 6;

pub const MAX_FAQS: usize = 6;
pub const MAX_PAA: usize = 4;
pub const MAX_TAKEAWAYS: usize = 3;

// =============================================================================
// Records
// =============================================================================

/// One body section: plain-text title + HTML content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

/// FAQ or PAA entry (plain text on both sides)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    pub question: String,
    pub answer: String,
}

/// Comparison/data table emitted by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// Structured article as returned by the generation stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleOutput {
    pub headline: String,
    pub subtitle: String,
    pub teaser: String,
    pub meta_title: String,
    pub meta_description: String,
    /// HTML, 80-120 words
    pub intro: String,
    /// HTML, 40-60 words, carries one natural-language citation
    pub direct_answer: String,
    /// Always materialized to at least the required count; optional tail trimmed
    pub sections: Vec<Section>,
    pub faqs: Vec<QaItem>,
    pub paa: Vec<QaItem>,
    pub key_takeaways: Vec<String>,
    pub tables: Vec<TableBlock>,
    /// Newline-separated `[N]: URL - description` lines
    pub sources: String,
    pub search_queries: String,
}

// =============================================================================
// Content Field Addressing
// =============================================================================

/// Addresses one of the HTML content fields the refinement and merge stages
/// operate on. Section indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentField {
    Intro,
    DirectAnswer,
    Section(usize),
}

impl ContentField {
    /// Flat-map key for this field
    pub fn key(&self) -> String {
        match self {
            Self::Intro => "Intro".to_string(),
            Self::DirectAnswer => "Direct_Answer".to_string(),
            Self::Section(i) => format!("section_{:02}_content", i + 1),
        }
    }

    /// Required fields are reviewed even when empty
    pub fn is_required(&self) -> bool {
        match self {
            Self::Intro | Self::DirectAnswer => true,
            Self::Section(i) => *i < REQUIRED_SECTIONS,
        }
    }

    /// All content fields in declared order
    pub fn all() -> Vec<ContentField> {
        let mut fields = vec![Self::Intro, Self::DirectAnswer];
        fields.extend((0..MAX_SECTIONS).map(Self::Section));
        fields
    }
}

impl std::fmt::Display for ContentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

// =============================================================================
// Extraction
// =============================================================================

impl ArticleOutput {
    /// Extract an article from the LLM's flat key map.
    ///
    /// Best-effort partial recovery: absent fields become safe defaults and
    /// produce warnings instead of failing, provided the minimum set
    /// (Headline, Intro, first section pair, Sources) is present.
    pub fn from_llm_value(value: &Value) -> Result<(Self, Vec<String>)> {
        let map = value
            .as_object()
            .ok_or_else(|| ForgeError::parse("article", "structured output is not an object"))?;

        let mut warnings = Vec::new();
        let mut plain = |key: &str| -> String {
            let raw = get_str(map, key);
            if raw.is_empty() {
                warnings.push(format!("missing field: {}", key));
            }
            text::strip_html(&raw)
        };

        let headline = plain("Headline");
        let subtitle = plain("Subtitle");
        let teaser = plain("Teaser");
        let meta_title = plain("Meta_Title");
        let meta_description = plain("Meta_Description");

        let intro = get_str(map, "Intro");
        if intro.is_empty() {
            warnings.push("missing field: Intro".to_string());
        }
        let direct_answer = get_str(map, "Direct_Answer");
        if direct_answer.is_empty() {
            warnings.push("missing field: Direct_Answer".to_string());
        }

        let mut sections = Vec::with_capacity(MAX_SECTIONS);
        for i in 1..=MAX_SECTIONS {
            let title = text::strip_html(&get_str(map, &format!("section_{:02}_title", i)));
            let content = get_str(map, &format!("section_{:02}_content", i));
            sections.push(Section { title, content });
        }
        // Trim empty optional tail, keep the required prefix materialized
        while sections.len() > REQUIRED_SECTIONS
            && sections.last().is_some_and(Section::is_empty)
        {
            sections.pop();
        }
        for (i, section) in sections.iter().enumerate().take(REQUIRED_SECTIONS) {
            if i > 0 && section.is_empty() {
                warnings.push(format!("missing required section {:02}", i + 1));
            }
        }

        let faqs = collect_qa(map, "faq", MAX_FAQS);
        if faqs.len() < 5 {
            warnings.push(format!("only {} FAQ items (expected >= 5)", faqs.len()));
        }
        let paa = collect_qa(map, "paa", MAX_PAA);
        if paa.len() < 3 {
            warnings.push(format!("only {} PAA items (expected >= 3)", paa.len()));
        }

        let key_takeaways: Vec<String> = (1..=MAX_TAKEAWAYS)
            .map(|i| text::strip_html(&get_str(map, &format!("key_takeaway_{:02}", i))))
            .filter(|t| !t.is_empty())
            .collect();

        let tables = map
            .get("tables")
            .and_then(|v| serde_json::from_value::<Vec<TableBlock>>(v.clone()).ok())
            .unwrap_or_default();

        let sources = get_str(map, "Sources");
        if sources.is_empty() {
            warnings.push("missing field: Sources".to_string());
        }
        let search_queries = {
            let v = get_str(map, "Search Queries");
            if v.is_empty() {
                get_str(map, "Search_Queries")
            } else {
                v
            }
        };

        let article = Self {
            headline,
            subtitle,
            teaser,
            meta_title,
            meta_description,
            intro,
            direct_answer,
            sections,
            faqs,
            paa,
            key_takeaways,
            tables,
            sources,
            search_queries,
        };

        article.check_minimum_set()?;
        Ok((article, warnings))
    }

    /// The unrecoverable minimum: Headline, Intro, first section pair, Sources.
    fn check_minimum_set(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.headline.trim().is_empty() {
            missing.push("Headline");
        }
        if self.intro.trim().is_empty() {
            missing.push("Intro");
        }
        let first = self.sections.first();
        if first.is_none_or(|s| s.title.trim().is_empty()) {
            missing.push("section_01_title");
        }
        if first.is_none_or(|s| s.content.trim().is_empty()) {
            missing.push("section_01_content");
        }
        if self.sources.trim().is_empty() {
            missing.push("Sources");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::parse(
                "article",
                format!("minimum field set missing: {}", missing.join(", ")),
            ))
        }
    }

    // -------------------------------------------------------------------------
    // Field access
    // -------------------------------------------------------------------------

    /// Content of a field, if the field exists in this article
    pub fn content(&self, field: ContentField) -> Option<&str> {
        match field {
            ContentField::Intro => Some(&self.intro),
            ContentField::DirectAnswer => Some(&self.direct_answer),
            ContentField::Section(i) => self.sections.get(i).map(|s| s.content.as_str()),
        }
    }

    /// Replace the content of a field; out-of-range sections are ignored
    pub fn set_content(&mut self, field: ContentField, content: String) {
        match field {
            ContentField::Intro => self.intro = content,
            ContentField::DirectAnswer => self.direct_answer = content,
            ContentField::Section(i) => {
                if let Some(section) = self.sections.get_mut(i) {
                    section.content = content;
                }
            }
        }
    }

    /// Content fields that exist in this article, in declared order
    pub fn content_fields(&self) -> Vec<ContentField> {
        ContentField::all()
            .into_iter()
            .filter(|f| self.content(*f).is_some())
            .collect()
    }

    /// Merged body text (HTML stripped) for AEO analysis and word counting
    pub fn merged_body_text(&self) -> String {
        let mut parts = vec![text::strip_html(&self.intro), text::strip_html(&self.direct_answer)];
        parts.extend(self.sections.iter().map(|s| text::strip_html(&s.content)));
        parts.retain(|p| !p.is_empty());
        parts.join("\n")
    }

    /// Every (key, value) string field, for whole-article scans (dash sweep)
    pub fn string_fields(&self) -> Vec<(String, &str)> {
        let mut fields: Vec<(String, &str)> = vec![
            ("Headline".into(), &self.headline),
            ("Subtitle".into(), &self.subtitle),
            ("Teaser".into(), &self.teaser),
            ("Meta_Title".into(), &self.meta_title),
            ("Meta_Description".into(), &self.meta_description),
            ("Intro".into(), &self.intro),
            ("Direct_Answer".into(), &self.direct_answer),
        ];
        for (i, s) in self.sections.iter().enumerate() {
            fields.push((format!("section_{:02}_title", i + 1), &s.title));
            fields.push((format!("section_{:02}_content", i + 1), &s.content));
        }
        for (i, qa) in self.faqs.iter().enumerate() {
            fields.push((format!("faq_{:02}_question", i + 1), &qa.question));
            fields.push((format!("faq_{:02}_answer", i + 1), &qa.answer));
        }
        for (i, qa) in self.paa.iter().enumerate() {
            fields.push((format!("paa_{:02}_question", i + 1), &qa.question));
            fields.push((format!("paa_{:02}_answer", i + 1), &qa.answer));
        }
        for (i, t) in self.key_takeaways.iter().enumerate() {
            fields.push((format!("key_takeaway_{:02}", i + 1), t));
        }
        fields.push(("Sources".into(), &self.sources));
        fields
    }

    /// Plain-text fields that must never contain HTML tags
    pub fn plain_text_fields(&self) -> Vec<(String, &str)> {
        let mut fields: Vec<(String, &str)> = vec![
            ("Headline".into(), &self.headline),
            ("Subtitle".into(), &self.subtitle),
            ("Teaser".into(), &self.teaser),
            ("Meta_Title".into(), &self.meta_title),
            ("Meta_Description".into(), &self.meta_description),
        ];
        for (i, s) in self.sections.iter().enumerate() {
            fields.push((format!("section_{:02}_title", i + 1), &s.title));
        }
        for (i, qa) in self.faqs.iter().enumerate() {
            fields.push((format!("faq_{:02}_question", i + 1), &qa.question));
            fields.push((format!("faq_{:02}_answer", i + 1), &qa.answer));
        }
        for (i, qa) in self.paa.iter().enumerate() {
            fields.push((format!("paa_{:02}_question", i + 1), &qa.question));
            fields.push((format!("paa_{:02}_answer", i + 1), &qa.answer));
        }
        for (i, t) in self.key_takeaways.iter().enumerate() {
            fields.push((format!("key_takeaway_{:02}", i + 1), t));
        }
        fields
    }

    /// Flat-mapping view used by the merge stage.
    ///
    /// Deterministic: the same article always yields the same map.
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("Headline".into(), Value::String(self.headline.clone()));
        map.insert("Subtitle".into(), Value::String(self.subtitle.clone()));
        map.insert("Teaser".into(), Value::String(self.teaser.clone()));
        map.insert("Meta_Title".into(), Value::String(self.meta_title.clone()));
        map.insert(
            "Meta_Description".into(),
            Value::String(self.meta_description.clone()),
        );
        map.insert("Intro".into(), Value::String(self.intro.clone()));
        map.insert(
            "Direct_Answer".into(),
            Value::String(self.direct_answer.clone()),
        );
        for (i, s) in self.sections.iter().enumerate() {
            map.insert(
                format!("section_{:02}_title", i + 1),
                Value::String(s.title.clone()),
            );
            map.insert(
                format!("section_{:02}_content", i + 1),
                Value::String(s.content.clone()),
            );
        }
        for (i, qa) in self.faqs.iter().enumerate() {
            map.insert(
                format!("faq_{:02}_question", i + 1),
                Value::String(qa.question.clone()),
            );
            map.insert(
                format!("faq_{:02}_answer", i + 1),
                Value::String(qa.answer.clone()),
            );
        }
        for (i, qa) in self.paa.iter().enumerate() {
            map.insert(
                format!("paa_{:02}_question", i + 1),
                Value::String(qa.question.clone()),
            );
            map.insert(
                format!("paa_{:02}_answer", i + 1),
                Value::String(qa.answer.clone()),
            );
        }
        for (i, t) in self.key_takeaways.iter().enumerate() {
            map.insert(format!("key_takeaway_{:02}", i + 1), Value::String(t.clone()));
        }
        map.insert(
            "tables".into(),
            serde_json::to_value(&self.tables).unwrap_or(Value::Array(vec![])),
        );
        map.insert("Sources".into(), Value::String(self.sources.clone()));
        map.insert(
            "Search Queries".into(),
            Value::String(self.search_queries.clone()),
        );
        map
    }
}

fn get_str(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn collect_qa(map: &Map<String, Value>, prefix: &str, max: usize) -> Vec<QaItem> {
    (1..=max)
        .filter_map(|i| {
            let question = text::strip_html(&get_str(map, &format!("{}_{:02}_question", prefix, i)));
            let answer = text::strip_html(&get_str(map, &format!("{}_{:02}_answer", prefix, i)));
            if question.is_empty() {
                None
            } else {
                Some(QaItem { question, answer })
            }
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_article_value() -> Value {
        let mut map = Map::new();
        map.insert("Headline".into(), json!("Zero Trust Architecture Explained"));
        map.insert("Subtitle".into(), json!("A practical guide"));
        map.insert("Teaser".into(), json!("Teaser text"));
        map.insert("Meta_Title".into(), json!("Zero Trust Guide"));
        map.insert("Meta_Description".into(), json!("What zero trust means."));
        map.insert("Intro".into(), json!("<p>Intro paragraph.</p>"));
        map.insert("Direct_Answer".into(), json!("<p>Direct answer.</p>"));
        for i in 1..=6 {
            map.insert(format!("section_{:02}_title", i), json!(format!("Title {}", i)));
            map.insert(
                format!("section_{:02}_content", i),
                json!(format!("<p>Content {}</p>", i)),
            );
        }
        for i in 1..=5 {
            map.insert(format!("faq_{:02}_question", i), json!(format!("Q{}?", i)));
            map.insert(format!("faq_{:02}_answer", i), json!(format!("A{}", i)));
        }
        for i in 1..=3 {
            map.insert(format!("paa_{:02}_question", i), json!(format!("P{}?", i)));
            map.insert(format!("paa_{:02}_answer", i), json!(format!("PA{}", i)));
        }
        map.insert("key_takeaway_01".into(), json!("Takeaway one"));
        map.insert("Sources".into(), json!("[1]: https://example.org - report"));
        map.insert("Search Queries".into(), json!("zero trust"));
        Value::Object(map)
    }

    #[test]
    fn test_from_llm_value_full() {
        let (article, warnings) = ArticleOutput::from_llm_value(&full_article_value()).unwrap();
        assert_eq!(article.headline, "Zero Trust Architecture Explained");
        assert_eq!(article.sections.len(), 6);
        assert_eq!(article.faqs.len(), 5);
        assert_eq!(article.paa.len(), 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_plain_text_fields_stripped() {
        let mut value = full_article_value();
        value["Headline"] = json!("<b>Bold</b> Headline");
        let (article, _) = ArticleOutput::from_llm_value(&value).unwrap();
        assert_eq!(article.headline, "Bold Headline");
    }

    #[test]
    fn test_partial_recovery_with_warnings() {
        let value = json!({
            "Headline": "H",
            "Intro": "<p>i</p>",
            "section_01_title": "T",
            "section_01_content": "<p>c</p>",
            "Sources": "[1]: https://example.org - x",
        });
        let (article, warnings) = ArticleOutput::from_llm_value(&value).unwrap();
        assert_eq!(article.sections.len(), REQUIRED_SECTIONS);
        assert!(warnings.iter().any(|w| w.contains("Subtitle")));
        assert!(warnings.iter().any(|w| w.contains("FAQ")));
    }

    #[test]
    fn test_minimum_set_enforced() {
        let value = json!({"Headline": "only a headline"});
        let err = ArticleOutput::from_llm_value(&value).unwrap_err();
        assert!(err.to_string().contains("minimum field set"));
    }

    #[test]
    fn test_optional_tail_trimmed() {
        let mut value = full_article_value();
        value["section_07_title"] = json!("");
        value["section_07_content"] = json!("");
        let (article, _) = ArticleOutput::from_llm_value(&value).unwrap();
        assert_eq!(article.sections.len(), 6);
    }

    #[test]
    fn test_content_field_addressing() {
        let (mut article, _) = ArticleOutput::from_llm_value(&full_article_value()).unwrap();
        assert_eq!(article.content(ContentField::Intro), Some("<p>Intro paragraph.</p>"));
        assert!(article.content(ContentField::Section(8)).is_none());
        article.set_content(ContentField::Section(0), "<p>new</p>".into());
        assert_eq!(article.sections[0].content, "<p>new</p>");
    }

    #[test]
    fn test_content_field_required() {
        assert!(ContentField::Intro.is_required());
        assert!(ContentField::Section(5).is_required());
        assert!(!ContentField::Section(6).is_required());
    }

    #[test]
    fn test_to_flat_map_deterministic() {
        let (article, _) = ArticleOutput::from_llm_value(&full_article_value()).unwrap();
        let a = article.to_flat_map();
        let b = article.to_flat_map();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a["Headline"], json!("Zero Trust Architecture Explained"));
        assert!(a.contains_key("section_06_content"));
    }

    #[test]
    fn test_sources_array_coerced() {
        let mut value = full_article_value();
        value["Sources"] = json!(["[1]: https://a.example - a", "[2]: https://b.example - b"]);
        let (article, _) = ArticleOutput::from_llm_value(&value).unwrap();
        assert!(article.sources.contains('\n'));
    }
}
