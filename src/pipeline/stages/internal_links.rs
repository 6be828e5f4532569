//! Stage 5 - Internal Links
//!
//! Ranks the linkable pool by keyword overlap, probes the top candidates,
//! and distributes one link per body section. Anchors are inserted only
//! into `<p>`/`<li>` text runs, never inside headings or existing anchors.
//! The rewritten sections travel in this stage's own parallel slot; the
//! merge stage applies them.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::constants::pipeline as pipeline_constants;
use crate::net::probe::{SharedProber, probe_all};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::{InternalLink, InternalLinksResult};
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::{ContentField, ForgeError, LinkableUrl, Result};

pub struct InternalLinksStage {
    prober: SharedProber,
    probe_concurrency: usize,
}

impl InternalLinksStage {
    pub fn new(prober: SharedProber, probe_concurrency: usize) -> Self {
        Self {
            prober,
            probe_concurrency,
        }
    }
}

#[async_trait]
impl Stage for InternalLinksStage {
    fn number(&self) -> u8 {
        5
    }

    fn name(&self) -> &'static str {
        "internal_links"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(5, "internal_links", "no structured data"))?;

        let mut warnings = Vec::new();

        if ctx.linkable_pool.is_empty() {
            warnings.push("no internal link candidates available".to_string());
            return Ok(StageReport::with_warnings(
                StageOutput::InternalLinks(InternalLinksResult::default()),
                warnings,
            ));
        }

        // Rank by relevance against the primary keyword and section titles
        let keyword_tokens = significant_tokens(&ctx.job_config.primary_keyword);
        let title_tokens: HashSet<String> = article
            .sections
            .iter()
            .flat_map(|s| significant_tokens(&s.title))
            .collect();

        let competitors: Vec<String> = ctx
            .company_data
            .as_ref()
            .map(|c| c.competitors.clone())
            .unwrap_or_default();

        let mut ranked: Vec<LinkableUrl> = ctx
            .linkable_pool
            .iter()
            .filter(|candidate| {
                !competitors
                    .iter()
                    .any(|domain| candidate.url.contains(domain.as_str()))
            })
            .map(|candidate| {
                let score = relevance(candidate, &keyword_tokens, &title_tokens);
                candidate.clone().with_confidence(score)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(pipeline_constants::INTERNAL_LINK_CANDIDATES);

        // Probe the shortlist, keep reachable candidates in rank order
        let urls: Vec<String> = ranked.iter().map(|c| c.url.clone()).collect();
        let outcomes = probe_all(&self.prober, urls, self.probe_concurrency).await;
        let valid: Vec<LinkableUrl> = ranked
            .into_iter()
            .zip(outcomes)
            .filter_map(|(candidate, (_, outcome))| outcome.is_valid().then_some(candidate))
            .collect();

        if valid.is_empty() {
            warnings.push("no internal link candidates survived probing".to_string());
            return Ok(StageReport::with_warnings(
                StageOutput::InternalLinks(InternalLinksResult::default()),
                warnings,
            ));
        }

        // Distribute one link per section; with a sparse pool, spread evenly
        // instead of bunching at the top
        let sections: Vec<(usize, &str, &str)> = article
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.content.trim().is_empty())
            .map(|(i, s)| (i, s.title.as_str(), s.content.as_str()))
            .collect();

        let step = if valid.len() >= sections.len() {
            1
        } else {
            sections.len().div_ceil(valid.len())
        };

        let mut links = Vec::new();
        let mut linked_sections = BTreeMap::new();
        let mut candidates = valid.iter();

        for (slot, (index, _title, content)) in sections.iter().enumerate() {
            if slot % step != 0 {
                continue;
            }
            let Some(candidate) = candidates.next() else {
                break;
            };
            let anchor_text = anchor_text(&candidate.title);
            let field = ContentField::Section(*index);
            match insert_anchor(content, &candidate.url, &anchor_text, &candidate.title) {
                Some(rewritten) => {
                    linked_sections.insert(field.key(), rewritten);
                    links.push(InternalLink {
                        url: candidate.url.clone(),
                        title: candidate.title.clone(),
                        anchor_text,
                        section_key: field.key(),
                    });
                }
                None => {
                    debug!(section = %field, url = %candidate.url, "No safe insertion point");
                }
            }
        }

        if links.is_empty() {
            warnings.push("no internal links could be inserted".to_string());
        }
        info!(links = links.len(), "Internal links placed");

        let html = render_links_html(&links);
        Ok(StageReport::with_warnings(
            StageOutput::InternalLinks(InternalLinksResult {
                links,
                html,
                linked_sections,
            }),
            warnings,
        ))
    }
}

// =============================================================================
// Ranking
// =============================================================================

fn significant_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .map(|word| word.to_string())
        .collect()
}

/// Relevance score in [0, 10]: base kind confidence plus keyword overlap
fn relevance(
    candidate: &LinkableUrl,
    keyword_tokens: &HashSet<String>,
    title_tokens: &HashSet<String>,
) -> f64 {
    let candidate_tokens = significant_tokens(&format!("{} {}", candidate.title, candidate.url));
    let keyword_overlap = candidate_tokens.intersection(keyword_tokens).count() as f64;
    let title_overlap = candidate_tokens.intersection(title_tokens).count() as f64;
    (candidate.kind.base_confidence() + keyword_overlap * 2.0 + title_overlap).clamp(0.0, 10.0)
}

/// Anchor text normalized to the word cap
fn anchor_text(title: &str) -> String {
    title
        .split_whitespace()
        .take(pipeline_constants::MAX_ANCHOR_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Insertion
// =============================================================================

/// Insert one anchor into the section HTML.
///
/// Preferred: wrap an existing phrase matching the candidate's title tokens
/// inside a `<p>`/`<li>` text run. Fallback: append a related-reading
/// paragraph. Headings and existing anchors are never touched.
fn insert_anchor(html: &str, url: &str, anchor: &str, title: &str) -> Option<String> {
    if let Some(rewritten) = wrap_matching_phrase(html, url, title) {
        return Some(rewritten);
    }
    // No phrase match: append a standalone paragraph
    Some(format!(
        "{}\n<p>Related reading: <a href=\"{}\">{}</a></p>",
        html.trim_end(),
        url.replace('"', "%22"),
        escape_text(anchor)
    ))
}

fn wrap_matching_phrase(html: &str, url: &str, title: &str) -> Option<String> {
    let tokens: Vec<String> = title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.to_string())
        .collect();
    if tokens.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(html.len() + 64);
    let mut rest = html;
    let mut anchor_depth = 0usize;
    let mut heading_depth = 0usize;
    let mut container_depth = 0usize; // <p> or <li>
    let mut done = false;

    while let Some(open) = rest.find('<') {
        let text = &rest[..open];
        if !done && anchor_depth == 0 && heading_depth == 0 && container_depth > 0 {
            if let Some(wrapped) = wrap_in_text_run(text, url, &tokens) {
                out.push_str(&wrapped);
                done = true;
            } else {
                out.push_str(text);
            }
        } else {
            out.push_str(text);
        }

        let Some(close) = rest[open..].find('>') else {
            out.push_str(&rest[open..]);
            return done.then_some(out);
        };
        let tag = &rest[open..open + close + 1];
        let lower = tag.to_ascii_lowercase();
        if lower.starts_with("<a ") || lower == "<a>" {
            anchor_depth += 1;
        } else if lower.starts_with("</a") {
            anchor_depth = anchor_depth.saturating_sub(1);
        } else if is_heading_open(&lower) {
            heading_depth += 1;
        } else if is_heading_close(&lower) {
            heading_depth = heading_depth.saturating_sub(1);
        } else if is_container_open(&lower) {
            container_depth += 1;
        } else if is_container_close(&lower) {
            container_depth = container_depth.saturating_sub(1);
        }
        out.push_str(tag);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    done.then_some(out)
}

/// Wrap the longest run of title-token words starting at the first match
fn wrap_in_text_run(text: &str, url: &str, tokens: &[String]) -> Option<String> {
    let words: Vec<&str> = text.split_inclusive(char::is_whitespace).collect();
    let matches_token =
        |word: &str| tokens.iter().any(|t| word.trim().to_lowercase().trim_matches(|c: char| !c.is_alphanumeric()) == *t);

    let start = words.iter().position(|w| matches_token(w))?;
    let mut end = start;
    while end + 1 < words.len()
        && end + 1 - start < pipeline_constants::MAX_ANCHOR_WORDS
        && matches_token(words[end + 1])
    {
        end += 1;
    }

    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(&words[..start].concat());

    let phrase: String = words[start..=end].concat();
    // Keep trailing whitespace outside the anchor
    let trimmed = phrase.trim_end();
    let trailing = &phrase[trimmed.len()..];
    out.push_str(&format!(
        "<a href=\"{}\">{}</a>{}",
        url.replace('"', "%22"),
        trimmed,
        trailing
    ));
    out.push_str(&words[end + 1..].concat());
    Some(out)
}

fn is_container_open(tag: &str) -> bool {
    tag == "<p>" || tag.starts_with("<p ") || tag == "<li>" || tag.starts_with("<li ")
}

fn is_container_close(tag: &str) -> bool {
    tag == "</p>" || tag == "</li>"
}

fn is_heading_open(tag: &str) -> bool {
    tag.len() >= 3
        && tag.starts_with("<h")
        && tag.as_bytes()[2].is_ascii_digit()
}

fn is_heading_close(tag: &str) -> bool {
    tag.len() >= 4
        && tag.starts_with("</h")
        && tag.as_bytes()[3].is_ascii_digit()
}

fn render_links_html(links: &[InternalLink]) -> String {
    if links.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"related-links\">\n");
    for link in links {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            link.url.replace('"', "%22"),
            escape_text(&link.title)
        ));
    }
    html.push_str("</ul>");
    html
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// =============================================================================
// Tests
// =============================================================================
