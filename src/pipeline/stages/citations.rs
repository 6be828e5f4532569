//! Stage 4 - Citations
//!
//! Parses `Sources` lines, filters self/competitor domains, probes every
//! URL, substitutes authority fallbacks for dead links, and builds the
//! citation map plus the rendered Sources block. Probe errors are treated
//! as invalid URLs, never as stage failures.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::info;

use crate::config::CitationsConfig;
use crate::net::probe::{SharedProber, probe_all};
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::results::CitationsResult;
use crate::pipeline::stage::{Stage, StageOutput, StageReport};
use crate::types::{Citation, CitationMap, ForgeError, Result};

static SOURCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<n>\d+)\]:\s*(?P<url>\S+)\s*[\u{2013}\u{2014}-]\s*(?P<desc>.*)$")
        .expect("valid source line regex")
});

pub struct CitationsStage {
    prober: SharedProber,
    config: CitationsConfig,
    probe_concurrency: usize,
}

impl CitationsStage {
    pub fn new(prober: SharedProber, config: CitationsConfig, probe_concurrency: usize) -> Self {
        Self {
            prober,
            config,
            probe_concurrency,
        }
    }
}

#[async_trait]
impl Stage for CitationsStage {
    fn number(&self) -> u8 {
        4
    }

    fn name(&self) -> &'static str {
        "citations"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<StageReport> {
        let article = ctx
            .structured_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(4, "citations", "no structured data"))?;
        let company = ctx
            .company_data
            .as_ref()
            .ok_or_else(|| ForgeError::stage(4, "citations", "no company data"))?;

        let mut warnings = Vec::new();

        // Parse and dedup
        let mut parsed = parse_sources(&article.sources, &mut warnings);
        dedup_by_url(&mut parsed);

        // Self/competitor suppression applies to the original URL, before
        // any fallback could mask it
        parsed.retain(|source| {
            if company.owns_url(&source.url) {
                warnings.push(format!(
                    "citation [{}] dropped: self-referential link {}",
                    source.n, source.url
                ));
                false
            } else if company.is_competitor_url(&source.url) {
                warnings.push(format!(
                    "citation [{}] dropped: competitor link {}",
                    source.n, source.url
                ));
                false
            } else {
                true
            }
        });

        // Probe everything that survived
        let urls: Vec<String> = parsed.iter().map(|s| s.url.clone()).collect();
        let outcomes = probe_all(&self.prober, urls, self.probe_concurrency).await;

        // Build the map, substituting authority fallbacks for dead URLs
        let fallbacks = self.fallback_list(&ctx.job_config.primary_keyword);
        let mut fallback_cursor = 0usize;
        let mut map = CitationMap::new();

        for (source, (_, outcome)) in parsed.iter().zip(outcomes.iter()) {
            let citation = if outcome.is_valid() {
                Citation {
                    url: source.url.clone(),
                    title: source.desc.clone(),
                    kind: "source".to_string(),
                }
            } else {
                let substitute = fallbacks[fallback_cursor % fallbacks.len()].clone();
                fallback_cursor += 1;
                warnings.push(format!(
                    "citation [{}] unreachable ({}); substituted authority fallback {}",
                    source.n, source.url, substitute
                ));
                Citation {
                    url: substitute,
                    title: source.desc.clone(),
                    kind: "authority".to_string(),
                }
            };
            map.insert(source.n, citation);
        }

        if map.is_empty() {
            warnings.push("no valid citations parsed from Sources".to_string());
        }

        info!(
            citations = map.len(),
            fallbacks = fallback_cursor,
            "Citations resolved"
        );

        let html = render_sources_html(&map);
        Ok(StageReport::with_warnings(
            StageOutput::Citations(CitationsResult { map, html }),
            warnings,
        ))
    }
}

impl CitationsStage {
    /// Authority list for the job's topic, falling back to the default set
    fn fallback_list(&self, keyword: &str) -> Vec<String> {
        let lower = keyword.to_lowercase();
        for (topic, urls) in &self.config.authority_fallbacks {
            if topic != "default" && lower.contains(topic.as_str()) && !urls.is_empty() {
                return urls.clone();
            }
        }
        self.config
            .authority_fallbacks
            .get("default")
            .cloned()
            .filter(|urls| !urls.is_empty())
            .unwrap_or_else(|| vec!["https://www.nist.gov/".to_string()])
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone)]
struct ParsedSource {
    n: u32,
    url: String,
    desc: String,
}

fn parse_sources(sources: &str, warnings: &mut Vec<String>) -> Vec<ParsedSource> {
    let mut parsed = Vec::new();
    for line in sources.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match SOURCE_LINE_RE.captures(line) {
            Some(caps) => {
                let n: u32 = match caps["n"].parse() {
                    Ok(n) => n,
                    Err(_) => {
                        warnings.push(format!("source line discarded (marker overflow): {}", line));
                        continue;
                    }
                };
                parsed.push(ParsedSource {
                    n,
                    url: caps["url"].to_string(),
                    desc: caps["desc"].trim().to_string(),
                });
            }
            None => warnings.push(format!("source line discarded (unparseable): {}", line)),
        }
    }
    parsed
}

/// Collapse duplicate URLs, keeping the lowest marker number
fn dedup_by_url(sources: &mut Vec<ParsedSource>) {
    sources.sort_by_key(|s| s.n);
    let mut seen = HashSet::new();
    sources.retain(|s| seen.insert(s.url.clone()));
}

fn render_sources_html(map: &CitationMap) -> String {
    let mut html = String::from("<ul class=\"sources\">\n");
    for (n, citation) in map {
        let label = if citation.title.is_empty() {
            citation.url.clone()
        } else {
            citation.title.clone()
        };
        html.push_str(&format!(
            "<li id=\"source-{n}\">[{n}] <a href=\"{url}\" rel=\"nofollow noopener\">{label}</a></li>\n",
            n = n,
            url = citation.url.replace('"', "%22"),
            label = escape_text(&label),
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
