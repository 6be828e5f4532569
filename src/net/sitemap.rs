//! Sitemap Resolution and Company Context
//!
//! The data-fetch stage's producer: crawls the company sitemap into a
//! classified linkable pool and derives the company context (name, domain,
//! description, tone). The description can be refined by one bounded LLM
//! call; failure there degrades to derived defaults.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::ai::provider::{SharedProvider, ToolOptions};
use crate::ai::{timeout::with_timeout, TimeoutConfig};
use crate::config::JobConfig;
use crate::constants::pipeline as pipeline_constants;
use crate::types::company::{CompanyContext, LinkablePool, LinkableUrl, PageKind, domain_of};
use crate::types::{ForgeError, Result};

static LOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("valid loc regex"));

/// Produces the Stage 0 outputs. Implemented by the sitemap resolver in
/// production and by scripted doubles in tests.
#[async_trait]
pub trait CompanyResolver: Send + Sync {
    async fn resolve(&self, job: &JobConfig) -> Result<(CompanyContext, LinkablePool)>;
}

pub type SharedResolver = Arc<dyn CompanyResolver>;

/// Default resolver: sitemap crawl + derived company profile
pub struct SitemapResolver {
    client: reqwest::Client,
    /// Optional LLM used to refine the company description
    provider: Option<SharedProvider>,
    timeouts: TimeoutConfig,
}

impl SitemapResolver {
    pub fn new(provider: Option<SharedProvider>) -> Result<Self> {
        let timeouts = TimeoutConfig::default();
        let client = reqwest::Client::builder()
            .timeout(timeouts.sitemap)
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider,
            timeouts,
        })
    }

    async fn fetch_sitemap(&self, base: &str) -> Option<String> {
        let base = base.trim_end_matches('/');
        for path in ["sitemap.xml", "sitemap_index.xml"] {
            let url = format!("{}/{}", base, path);
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "Fetched sitemap");
                    return response.text().await.ok();
                }
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "Sitemap not available");
                }
                Err(e) => {
                    debug!(url = %url, "Sitemap fetch failed: {}", e);
                }
            }
        }
        None
    }

    async fn refine_description(&self, company: &CompanyContext, job: &JobConfig) -> Option<String> {
        let provider = self.provider.as_ref()?;
        let prompt = format!(
            "In two sentences, describe what the company at {} likely does, \
             based on its domain name '{}' and the topic '{}'. \
             Write in plain prose, no markdown.",
            company.url, company.domain, job.primary_keyword
        );
        let result = with_timeout(
            self.timeouts.field_review,
            provider.generate(&prompt, &serde_json::Value::Null, ToolOptions::none()),
            "company description",
        )
        .await;
        match result {
            Ok(response) => {
                let text = response.text().trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                warn!("Company description refinement failed: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl CompanyResolver for SitemapResolver {
    async fn resolve(&self, job: &JobConfig) -> Result<(CompanyContext, LinkablePool)> {
        let domain = domain_of(&job.company_url)
            .ok_or_else(|| ForgeError::Input(format!("invalid company_url: {}", job.company_url)))?;

        let mut company = CompanyContext {
            name: company_name_from_domain(&domain),
            url: job.company_url.clone(),
            domain,
            description: String::new(),
            tone: job
                .tone_override
                .clone()
                .unwrap_or_else(|| "professional, clear, helpful".to_string()),
            language: job.language.clone().unwrap_or_else(|| "en".to_string()),
            market: job.market.clone().unwrap_or_else(|| "global".to_string()),
            competitors: job.competitors.clone(),
        };

        company.description = match self.refine_description(&company, job).await {
            Some(refined) => refined,
            None => format!(
                "{} is a company publishing expert content on {}.",
                company.name, job.primary_keyword
            ),
        };

        let pool = match self.fetch_sitemap(&job.company_url).await {
            Some(xml) => parse_sitemap(&xml, &company.domain),
            None => {
                warn!("No sitemap found for {}; internal links degraded", company.url);
                Vec::new()
            }
        };

        debug!(urls = pool.len(), "Linkable pool built");
        Ok((company, pool))
    }
}

// =============================================================================
// Parsing and classification
// =============================================================================

/// Extract `<loc>` entries belonging to `domain`, classified by path
pub fn parse_sitemap(xml: &str, domain: &str) -> LinkablePool {
    LOC_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let url = caps[1].trim().to_string();
            // own-domain URLs only
            if domain_of(&url)? != domain {
                return None;
            }
            let kind = classify_url(&url);
            Some(LinkableUrl::new(url.clone(), title_from_url(&url), kind))
        })
        .take(pipeline_constants::MAX_LINKABLE_POOL)
        .collect()
}

/// Classify a URL by its path segments
pub fn classify_url(url: &str) -> PageKind {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    let has = |needle: &str| path.split('/').any(|seg| seg.starts_with(needle));

    if has("blog") || has("news") || has("article") {
        PageKind::Blog
    } else if has("product") || has("pricing") || has("platform") {
        PageKind::Product
    } else if has("service") || has("solution") {
        PageKind::Service
    } else if has("docs") || has("documentation") || has("api") {
        PageKind::Docs
    } else if has("resource") || has("guide") || has("whitepaper") || has("ebook") {
        PageKind::Resource
    } else {
        PageKind::Other
    }
}

/// Human-readable title from the final URL slug
pub fn title_from_url(url: &str) -> String {
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    words.join(" ")
}

fn company_name_from_domain(domain: &str) -> String {
    let base = domain.split('.').next().unwrap_or(domain);
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => domain.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
