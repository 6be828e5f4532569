//! Parallel Stage Results
//!
//! Typed partial contributions of the fan-out stages. Each stage owns
//! exactly one slot in `ParallelResults`; the merge stage folds them into
//! the validated article at fixed keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::CitationMap;

/// Citations stage output: resolved map + rendered Sources block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationsResult {
    pub map: CitationMap,
    pub html: String,
}

/// One inserted internal link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalLink {
    pub url: String,
    pub title: String,
    pub anchor_text: String,
    /// Flat-map key of the section carrying this link
    pub section_key: String,
}

/// Internal-links stage output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalLinksResult {
    pub links: Vec<InternalLink>,
    /// Related-reading HTML block
    pub html: String,
    /// Section content rewritten with anchors, keyed by flat-map key.
    /// Applied by the merge stage; the source article is never mutated.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub linked_sections: BTreeMap<String, String>,
}

/// One table-of-contents entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocEntry {
    /// 1-3 word label
    pub label: String,
    /// Anchor slug (no leading '#')
    pub anchor: String,
    /// Zero-based section index
    pub section_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TocResult {
    pub entries: Vec<TocEntry>,
}

/// Metadata stage output (read time, dates, E-E-A-T fields)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataResult {
    pub word_count: usize,
    pub reading_time_minutes: usize,
    /// RFC3339 timestamp
    pub publication_date: String,
    pub author: String,
    pub organization: String,
    /// Absolute canonical URL for the published article
    pub canonical_url: String,
}

/// Image stage output: placement -> relative path or URI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResult {
    pub images: BTreeMap<String, String>,
}

/// One optional slot per parallel stage; disjoint by construction
#[derive(Debug, Clone, Default)]
pub struct ParallelResults {
    pub citations: Option<CitationsResult>,
    pub internal_links: Option<InternalLinksResult>,
    pub toc: Option<TocResult>,
    pub metadata: Option<MetadataResult>,
    pub images: Option<ImageResult>,
}
