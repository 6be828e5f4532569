//! Structured-Output Schemas
//!
//! Declarative JSON schemas handed to the provider, plus the typed records
//! the responses deserialize into. The article record itself lives in
//! `types::article`; the review and AEO analysis records are defined here
//! next to their schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::types::article::{MAX_FAQS, MAX_PAA, MAX_SECTIONS, MAX_TAKEAWAYS};

fn string_prop(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn int_prop(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

/// Schema for the full article structured output (generation stage)
pub fn article_schema() -> Value {
    let mut props = Map::new();
    props.insert(
        "Headline".into(),
        string_prop("Plain text, 50-60 characters, contains the primary keyword"),
    );
    props.insert("Subtitle".into(), string_prop("Plain text, 80-100 characters"));
    props.insert("Teaser".into(), string_prop("Plain text teaser paragraph"));
    props.insert(
        "Meta_Title".into(),
        string_prop("Plain text, at most 60 characters"),
    );
    props.insert(
        "Meta_Description".into(),
        string_prop("Plain text, 100-160 characters"),
    );
    props.insert("Intro".into(), string_prop("HTML paragraphs, 80-120 words"));
    props.insert(
        "Direct_Answer".into(),
        string_prop(
            "HTML paragraph of 40-60 words answering the primary keyword directly, \
             with one natural-language citation",
        ),
    );

    for i in 1..=MAX_SECTIONS {
        let required = i <= 6;
        props.insert(
            format!("section_{:02}_title", i),
            string_prop(if required {
                "Plain-text section title"
            } else {
                "Plain-text section title (optional)"
            }),
        );
        props.insert(
            format!("section_{:02}_content", i),
            string_prop("Section HTML: 3-5 paragraphs of 60-100 words each"),
        );
    }
    for i in 1..=MAX_FAQS {
        props.insert(
            format!("faq_{:02}_question", i),
            string_prop("Plain-text FAQ question"),
        );
        props.insert(
            format!("faq_{:02}_answer", i),
            string_prop("Plain-text FAQ answer"),
        );
    }
    for i in 1..=MAX_PAA {
        props.insert(
            format!("paa_{:02}_question", i),
            string_prop("Plain-text People-Also-Ask question"),
        );
        props.insert(
            format!("paa_{:02}_answer", i),
            string_prop("Plain-text People-Also-Ask answer"),
        );
    }
    for i in 1..=MAX_TAKEAWAYS {
        props.insert(
            format!("key_takeaway_{:02}", i),
            string_prop("Plain-text key takeaway"),
        );
    }

    props.insert(
        "tables".into(),
        json!({
            "type": "array",
            "description": "Comparison or data tables (may be empty)",
            "items": {
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "headers": {"type": "array", "items": {"type": "string"}},
                    "rows": {
                        "type": "array",
                        "items": {"type": "array", "items": {"type": "string"}}
                    }
                },
                "required": ["headers", "rows"]
            }
        }),
    );
    props.insert(
        "Sources".into(),
        string_prop("Newline-separated lines of the form '[N]: URL - short description'"),
    );
    props.insert(
        "Search Queries".into(),
        string_prop("Search queries used during research, one per line"),
    );

    json!({
        "type": "object",
        "properties": props,
        "required": [
            "Headline", "Subtitle", "Meta_Title", "Meta_Description",
            "Intro", "Direct_Answer",
            "section_01_title", "section_01_content",
            "Sources"
        ]
    })
}

// =============================================================================
// Review Response (Stage 3, pass 1)
// =============================================================================

/// Structured return of a per-field quality review
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewResponse {
    #[serde(default)]
    pub fixed_content: String,
    #[serde(default)]
    pub issues_fixed: u32,
    #[serde(default)]
    pub em_dashes_fixed: u32,
    #[serde(default)]
    pub en_dashes_fixed: u32,
    #[serde(default)]
    pub lists_added: u32,
    #[serde(default)]
    pub citations_added: u32,
    #[serde(default)]
    pub fixes: Vec<ReviewFix>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewFix {
    #[serde(default)]
    pub description: String,
}

/// Schema for the per-field review response
pub fn review_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fixed_content": string_prop("The corrected field content, complete and unabridged"),
            "issues_fixed": int_prop("Total number of issues fixed"),
            "em_dashes_fixed": int_prop("Em-dashes replaced"),
            "en_dashes_fixed": int_prop("En-dashes replaced"),
            "lists_added": int_prop("Lists introduced or repaired"),
            "citations_added": int_prop("Natural-language citations added"),
            "fixes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"}
                    },
                    "required": ["description"]
                }
            }
        },
        "required": ["fixed_content", "issues_fixed"]
    })
}

// =============================================================================
// AEO Analysis (Stage 3, pass 2)
// =============================================================================

/// Structured return of the lightweight AEO analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AeoAnalysis {
    #[serde(default)]
    pub citations: usize,
    #[serde(default)]
    pub conversational_phrases: usize,
    #[serde(default)]
    pub question_patterns: usize,
}

/// Schema for the AEO analysis response
pub fn aeo_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "citations": int_prop("Natural-language citation count across the text"),
            "conversational_phrases": int_prop("Conversational phrase count"),
            "question_patterns": int_prop("Question pattern count")
        },
        "required": ["citations", "conversational_phrases", "question_patterns"]
    })
}

/// Schema for a plain rewritten-content response (dash sweep, AEO enhance)
pub fn rewrite_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fixed_content": string_prop("The rewritten content, complete and unabridged")
        },
        "required": ["fixed_content"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_schema_shape() {
        let schema = article_schema();
        assert_eq!(schema["type"], "object");
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("Headline"));
        assert!(props.contains_key("section_09_content"));
        assert!(props.contains_key("faq_06_answer"));
        assert!(props.contains_key("paa_04_question"));
        assert!(props.contains_key("Sources"));
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "section_01_content"));
    }

    #[test]
    fn test_review_response_deserializes_with_defaults() {
        let value = json!({"fixed_content": "text", "issues_fixed": 2});
        let review: ReviewResponse = serde_json::from_value(value).unwrap();
        assert_eq!(review.fixed_content, "text");
        assert_eq!(review.issues_fixed, 2);
        assert!(review.fixes.is_empty());
    }

    #[test]
    fn test_aeo_analysis_deserializes() {
        let value = json!({"citations": 10, "conversational_phrases": 4, "question_patterns": 2});
        let analysis: AeoAnalysis = serde_json::from_value(value).unwrap();
        assert_eq!(analysis.citations, 10);
    }
}
