//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Bounded concurrency caps
pub mod concurrency {
    /// Maximum concurrent per-field review calls (Stage 3, pass 1)
    pub const REVIEW_CONCURRENCY: usize = 15;

    /// Maximum concurrent AEO enhancement calls (Stage 3, pass 2)
    pub const AEO_CONCURRENCY: usize = 10;

    /// Maximum concurrent HTTP probes (Stages 4 and 5)
    pub const PROBE_CONCURRENCY: usize = 20;

    /// Maximum concurrent image generations (one per placement)
    pub const IMAGE_CONCURRENCY: usize = 3;
}

/// Retry policy for LLM calls
pub mod retry {
    /// Total attempts per LLM call
    pub const MAX_ATTEMPTS: usize = 3;

    /// Base delay for exponential backoff (seconds)
    pub const BASE_DELAY_SECS: u64 = 5;

    /// Backoff multiplier (5s, 15s, 45s)
    pub const BACKOFF_FACTOR: f32 = 3.0;
}

/// HTTP/Network constants
pub mod network {
    /// Default LLM request timeout (seconds)
    pub const LLM_TIMEOUT_SECS: u64 = 60;

    /// Per-field LLM timeout during refinement (seconds)
    pub const FIELD_TIMEOUT_SECS: u64 = 30;

    /// Per-URL probe timeout (seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 2;

    /// Sitemap fetch timeout (seconds)
    pub const SITEMAP_TIMEOUT_SECS: u64 = 10;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
}

/// AEO thresholds driving Stage 3 enhancement and the Stage 10 gate
pub mod aeo {
    /// Minimum natural-language citations across merged body text
    pub const MIN_CITATIONS: usize = 12;

    /// Minimum conversational phrases across merged body text
    pub const MIN_CONVERSATIONAL: usize = 8;

    /// Minimum question patterns across merged body text
    pub const MIN_QUESTIONS: usize = 5;

    /// Maximum body sections enhanced in one AEO pass
    pub const MAX_ENHANCED_SECTIONS: usize = 7;

    /// Direct answer word-count window
    pub const DIRECT_ANSWER_MIN_WORDS: usize = 40;
    pub const DIRECT_ANSWER_MAX_WORDS: usize = 60;
}

/// Quality gate scoring weights (must sum to 100)
pub mod scoring {
    /// Direct-answer compliance weight
    pub const DIRECT_ANSWER_WEIGHT: f64 = 25.0;

    /// Q&A format weight (FAQ, PAA, question-form titles)
    pub const QA_FORMAT_WEIGHT: f64 = 20.0;

    /// Citation clarity weight
    pub const CITATIONS_WEIGHT: f64 = 15.0;

    /// Natural-language weight
    pub const NATURAL_LANGUAGE_WEIGHT: f64 = 15.0;

    /// Structured-data weight (heading hierarchy, lists, tables)
    pub const STRUCTURE_WEIGHT: f64 = 10.0;

    /// E-E-A-T signals weight
    pub const EEAT_WEIGHT: f64 = 15.0;

    /// Minimum composite score to pass the gate
    pub const PASS_MARK: f64 = 75.0;

    /// Fraction of body paragraphs that must carry >= 2 citations
    pub const CITED_PARAGRAPH_RATIO: f64 = 0.60;
}

/// Stage 3 review constants
pub mod review {
    /// A rewrite shorter than this fraction of the original is rejected
    pub const MIN_LENGTH_RATIO: f64 = 0.5;

    /// Optional sections below this length are skipped entirely
    pub const OPTIONAL_SKIP_CHARS: usize = 100;
}

/// Pipeline constants
pub mod pipeline {
    /// Maximum full-article regenerations after a failed quality gate
    pub const MAX_REGENERATIONS: u32 = 2;

    /// Default article word-count target
    pub const DEFAULT_WORD_COUNT: usize = 1600;

    /// Assumed reading speed (words per minute)
    pub const WORDS_PER_MINUTE: usize = 200;

    /// Publication-date freshness window (days)
    pub const FRESHNESS_WINDOW_DAYS: i64 = 30;

    /// Maximum sitemap URLs admitted into the linkable pool
    pub const MAX_LINKABLE_POOL: usize = 200;

    /// Top-K internal-link candidates probed per run
    pub const INTERNAL_LINK_CANDIDATES: usize = 20;

    /// Maximum words in an internal-link anchor text
    pub const MAX_ANCHOR_WORDS: usize = 6;
}
