//! AEO Optimization Pass
//!
//! Measures citation density, conversational register, and question
//! patterns across the merged body, then drives targeted enhancement
//! prompts for the sections that fall short. The analyzer prefers one
//! small LLM call and falls back to deterministic string counting.

use serde_json::Value;
use tracing::{debug, warn};

use super::checklist::{
    count_citation_phrases, count_conversational_phrases, count_question_patterns,
};
use crate::ai::provider::{SharedProvider, ToolOptions};
use crate::ai::schema::{AeoAnalysis, aeo_schema};
use crate::ai::timeout::with_timeout;
use crate::constants::aeo;
use std::time::Duration;

/// Which of the three AEO components are below threshold
#[derive(Debug, Clone, Default)]
pub struct AeoGaps {
    pub citations: bool,
    pub conversational: bool,
    pub questions: bool,
}

impl AeoGaps {
    pub fn any(&self) -> bool {
        self.citations || self.conversational || self.questions
    }

    /// Human-readable list for prompts
    pub fn missing_components(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.citations {
            missing.push("natural-language citations (\"according to ...\")");
        }
        if self.conversational {
            missing.push("conversational phrases addressing the reader");
        }
        if self.questions {
            missing.push("question patterns");
        }
        missing
    }
}

/// Measure AEO component counts, LLM-first with a counting fallback
pub async fn analyze(provider: &SharedProvider, body: &str, timeout: Duration) -> AeoAnalysis {
    let prompt = format!(
        "Count three things in the article text below and return JSON only:\n\
         - `citations`: natural-language source attributions (\"according to X\", \
           \"a study by Y found\")\n\
         - `conversational_phrases`: phrases addressing the reader directly\n\
         - `question_patterns`: questions posed to the reader\n\n\
         ---\n{}\n",
        body
    );

    let result = with_timeout(
        timeout,
        provider.generate(&prompt, &aeo_schema(), ToolOptions::none()),
        "aeo analysis",
    )
    .await;

    match result {
        Ok(response) => match serde_json::from_value::<AeoAnalysis>(response.content.clone()) {
            Ok(analysis) => {
                debug!(
                    citations = analysis.citations,
                    conversational = analysis.conversational_phrases,
                    questions = analysis.question_patterns,
                    "AEO analysis (model)"
                );
                return analysis;
            }
            Err(e) => warn!("AEO analysis did not match schema: {}", e),
        },
        Err(e) => warn!("AEO analysis call failed: {}", e),
    }

    // Deterministic fallback
    let analysis = count_fallback(body);
    debug!(
        citations = analysis.citations,
        conversational = analysis.conversational_phrases,
        questions = analysis.question_patterns,
        "AEO analysis (fallback counters)"
    );
    analysis
}

/// String-counting fallback analyzer
pub fn count_fallback(body: &str) -> AeoAnalysis {
    AeoAnalysis {
        citations: count_citation_phrases(body),
        conversational_phrases: count_conversational_phrases(body),
        question_patterns: count_question_patterns(body),
    }
}

/// Thresholds applied to an analysis
pub fn gaps(analysis: &AeoAnalysis) -> AeoGaps {
    AeoGaps {
        citations: analysis.citations < aeo::MIN_CITATIONS,
        conversational: analysis.conversational_phrases < aeo::MIN_CONVERSATIONAL,
        questions: analysis.question_patterns < aeo::MIN_QUESTIONS,
    }
}

/// Enhancement prompt for one section. The model is asked for natural
/// integration, not for hitting a count.
pub fn enhancement_prompt(field_name: &str, content: &str, gaps: &AeoGaps) -> String {
    format!(
        "Rework the section below so it naturally includes more of the following, \
         woven into the existing sentences rather than appended:\n- {}\n\n\
         Keep the meaning, facts, HTML structure, and roughly the same length. \
         Never use em-dashes or en-dashes.\n\n\
         # Section: {}\n\n{}\n\n\
         Return JSON with the reworked section in `fixed_content`.",
        gaps.missing_components().join("\n- "),
        field_name,
        content
    )
}

/// Focused rewrite prompt for the direct answer
pub fn direct_answer_prompt(content: &str) -> String {
    format!(
        "Rewrite this direct answer to be 40-60 words, in HTML, answering the question \
         immediately in the first sentence, and containing exactly one natural-language \
         citation (\"according to ...\"). Never use em-dashes or en-dashes.\n\n{}\n\n\
         Return JSON with the rewritten answer in `fixed_content`.",
        content
    )
}

/// Focused rewrite prompt for the dash post-condition sweep
pub fn dash_rewrite_prompt(field_name: &str, content: &str, dash_name: &str) -> String {
    format!(
        "The text below contains {dash} characters. Rewrite it changing NOTHING except \
         replacing every {dash} with ` - `, a comma, or ` to `, whichever reads \
         naturally. Keep everything else byte-for-byte identical.\n\n\
         # Field: {field}\n\n{content}\n\n\
         Return JSON with the result in `fixed_content`.",
        dash = dash_name,
        field = field_name,
        content = content
    )
}

/// Extract `fixed_content` from a rewrite-style structured response
pub fn fixed_content(value: &Value) -> Option<String> {
    value
        .get("fixed_content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

// =============================================================================
// Tests
// =============================================================================
