//! Review Checklist
//!
//! The quality checklist encoded into the per-field review prompt, plus the
//! phrase inventories shared with the AEO analyzer and the quality gate.

/// Vocabulary that marks text as machine-written; reviewed out
pub const BANNED_PHRASES: &[&str] = &[
    "delve into",
    "delving into",
    "crucial to note",
    "important to note",
    "in today's digital age",
    "in today's fast-paced world",
    "seamlessly",
    "navigating the landscape",
    "navigating the complexities",
    "game-changer",
    "unlock the potential",
    "unleash",
    "elevate your",
    "embark on",
    "key points include:",
    "in conclusion,",
];

/// Brand spellings the review normalizes toward
pub const BRAND_NAMES: &[&str] = &[
    "IBM", "NIST", "McKinsey", "Gartner", "Forrester", "CISA", "SANS", "ISO", "Okta",
    "Microsoft", "Google", "AWS", "Cloudflare", "Pew Research",
];

/// Natural-language attribution markers counted as citations
pub const CITATION_PHRASES: &[&str] = &[
    "according to",
    "research from",
    "research shows",
    "a study by",
    "study by",
    "a survey by",
    "survey by",
    "a report by",
    "report by",
    "reports that",
    "data shows",
    "the data shows",
    "experts say",
    "experts at",
    "analysts at",
    "found that",
    "as reported by",
];

/// Conversational markers counted for the natural-language metric
pub const CONVERSATIONAL_PHRASES: &[&str] = &[
    "you might",
    "you need",
    "you can",
    "you are",
    "you're",
    "your team",
    "let's",
    "think of it",
    "here's the thing",
    "here's how",
    "in other words",
    "consider this",
    "that means",
    "the good news",
    "have you",
    "so what",
    "put simply",
];

/// Count occurrences of any citation phrase (case-insensitive)
pub fn count_citation_phrases(text: &str) -> usize {
    count_phrases(text, CITATION_PHRASES)
}

/// Count occurrences of any conversational phrase (case-insensitive)
pub fn count_conversational_phrases(text: &str) -> usize {
    count_phrases(text, CONVERSATIONAL_PHRASES)
}

/// Count question patterns (terminated questions)
pub fn count_question_patterns(text: &str) -> usize {
    text.matches('?').count()
}

fn count_phrases(text: &str, phrases: &[&str]) -> usize {
    let lower = text.to_lowercase();
    phrases
        .iter()
        .map(|phrase| lower.matches(phrase).count())
        .sum()
}

/// Build the per-field review prompt carrying the full checklist
pub fn review_prompt(field_name: &str, content: &str) -> String {
    let mut prompt = String::with_capacity(content.len() + 2048);

    prompt.push_str(
        "You are a meticulous line editor. Review the article field below and return a \
         corrected version. Fix ONLY real problems; keep the meaning, facts, and length. \
         Preserve valid HTML structure.\n\n",
    );

    prompt.push_str("# Checklist\n\n");
    prompt.push_str(
        "Structural:\n\
         - Truncated list items (ending mid-word or mid-sentence)\n\
         - Single-item fragment lists that should be prose\n\
         - Summary lists that merely repeat the preceding paragraph (remove the duplicate)\n\
         - Orphaned or mis-nested HTML tags, empty paragraphs\n\
         - Sentences split apart by a stray closing tag\n\n",
    );
    prompt.push_str(
        "Typography (zero tolerance):\n\
         - Replace every em-dash with ` - ` or a comma\n\
         - Replace every en-dash with `-` or ` to `\n\n",
    );
    prompt.push_str(
        "Capitalization:\n\
         - Normalize brand names (IBM, NIST, McKinsey, Gartner, CISA, ...)\n\
         - Capitalize sentence starts after a period\n\
         - Rewrite ALL-CAPS words into normal case unless they are acronyms\n\n",
    );
    prompt.push_str("Machine-written phrasing - rewrite or remove these and anything similar:\n");
    for phrase in BANNED_PHRASES {
        prompt.push_str(&format!("- \"{}\"\n", phrase));
    }
    prompt.push('\n');
    prompt.push_str(
        "Citations:\n\
         - Remove stacked academic markers like [1][2][3]; keep at most one [N] per claim\n\
         - Every kept [N] should follow a natural-language attribution \
           (\"according to ...\", \"a study by ... found\")\n\n",
    );
    prompt.push_str(
        "Answer-engine readiness:\n\
         - Keep natural-language citations in roughly 40% of paragraphs\n\
         - Keep a conversational register (address the reader as \"you\")\n\
         - Keep question phrasing where it exists\n\n",
    );

    prompt.push_str(&format!("# Field: {}\n\n", field_name));
    if content.trim().is_empty() {
        prompt.push_str(
            "(The field is currently EMPTY. That is itself a quality issue: write suitable \
             content for this field consistent with the checklist.)\n",
        );
    } else {
        prompt.push_str(content);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nReturn JSON with the corrected content in `fixed_content` and counts of what \
         you fixed. If nothing needs fixing, return the content unchanged.\n",
    );
    prompt
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_citation_phrases() {
        let text = "According to NIST, x. Research from IBM shows y. A study by Pew found z.";
        assert_eq!(count_citation_phrases(text), 3);
    }

    #[test]
    fn test_count_conversational_phrases() {
        let text = "You can start small. In other words, think of it as a pilot. Let's go.";
        assert!(count_conversational_phrases(text) >= 3);
    }

    #[test]
    fn test_count_question_patterns() {
        assert_eq!(count_question_patterns("What is it? Why now? Because."), 2);
    }

    #[test]
    fn test_review_prompt_mentions_field_and_rules() {
        let prompt = review_prompt("Intro", "<p>text</p>");
        assert!(prompt.contains("# Field: Intro"));
        assert!(prompt.contains("em-dash"));
        assert!(prompt.contains("delve into"));
    }

    #[test]
    fn test_review_prompt_flags_empty_required_field() {
        let prompt = review_prompt("section_02_content", "");
        assert!(prompt.contains("currently EMPTY"));
    }
}
