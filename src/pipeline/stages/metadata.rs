//! Stage 7 - Metadata
//!
//! Word count over HTML-stripped content, reading time at 200 wpm, the
//! publication date (optionally seeded-randomized inside the freshness
//! window), and the author/organization fields the E-E-A-T check reads.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;

use crate::constants::pipeline as pipeline_constants;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::MetadataResult;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::text;
use crate::types::{ArticleOutput, ForgeError, Result};

pub struct MetadataStage {
    randomize_publication_date: bool,
    freshness_window_days: i64,
}

impl MetadataStage {
    pub fn new(randomize_publication_date: bool, freshness_window_days: i64) -> Self {
        Self {
            randomize_publication_date,
            freshness_window_days,
        }
    }
}

#[async_trait]
impl Stage for MetadataStage {
    fn number(&self) -> u8 {
        7
    }

    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(7, "metadata", "no structured data"))?;

        let word_count = article_word_count(article);
        let reading_time_minutes =
            word_count.div_ceil(pipeline_constants::WORDS_PER_MINUTE).max(1);

        let publication_date = if self.randomize_publication_date {
            let window = self.freshness_window_days.max(1);
            let offset_days = rand::rng().random_range(0..window);
            (Utc::now() - Duration::days(offset_days)).to_rfc3339()
        } else {
            Utc::now().to_rfc3339()
        };

        let (author, organization) = match &ctx.company_data {
            Some(company) => (
                format!("{} Editorial Team", company.name),
                company.name.clone(),
            ),
            None => ("Editorial Team".to_string(), String::new()),
        };

        let canonical_url = ctx
            .company_data
            .as_ref()
            .map(|company| {
                format!(
                    "{}/blog/{}",
                    company.url.trim_end_matches('/'),
                    text::slugify(&article.headline)
                )
            })
            .unwrap_or_default();

        Ok(StageReport::new(StageOutput::Metadata(MetadataResult {
            word_count,
            reading_time_minutes,
            publication_date,
            author,
            organization,
            canonical_url,
        })))
    }
}

/// Words across every content field, HTML stripped
pub fn article_word_count(article: &ArticleOutput) -> usize {
    let mut count = text::word_count(&article.intro) + text::word_count(&article.direct_answer);
    for section in &article.sections {
        count += text::word_count(&section.content);
    }
    for qa in article.faqs.iter().chain(article.paa.iter()) {
        count += text::word_count(&qa.question) + text::word_count(&qa.answer);
    }
    count
}

// =============================================================================
// Tests
// =============================================================================
