//! Stage 6 - Table of Contents
//!
//! Deterministic TOC derivation from section titles: 1-3 word labels,
//! slugified anchors, empty titles skipped. Non-fatal and fast.

use async_trait::async_trait;

use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::{TocEntry, TocResult};
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::text;
use crate::types::{ForgeError, Result};

/// Filler words dropped when shortening a title into a label
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "do", "does", "how", "what", "why", "when", "your", "you",
    "to", "of", "for", "and", "in", "on", "with", "without",
];

pub struct TocStage;

impl TocStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TocStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for TocStage {
    fn number(&self) -> u8 {
        6
    }

    fn name(&self) -> &'static str {
        "toc"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(6, "toc", "no structured data"))?;

        let entries: Vec<TocEntry> = article
            .sections
            .iter()
            .enumerate()
            .filter(|(_, section)| !section.title.trim().is_empty())
            .map(|(index, section)| TocEntry {
                label: shorten_label(&section.title),
                anchor: text::slugify(&section.title),
                section_index: index,
            })
            .collect();

        Ok(StageReport::new(StageOutput::Toc(TocResult { entries })))
    }
}

/// Compress a title into a 1-3 word label
pub fn shorten_label(title: &str) -> String {
    let significant: Vec<&str> = title
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.to_lowercase().as_str()))
        .collect();

    let picked: Vec<&str> = if significant.is_empty() {
        title.split_whitespace().take(3).collect()
    } else {
        significant.into_iter().take(3).collect()
    };
    picked.join(" ")
}

// =============================================================================
// Tests
// =============================================================================
