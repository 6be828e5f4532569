//! Company Context and Linkable Pool
//!
//! Produced by the data-fetch stage, read by the prompt builder, the
//! citations stage (self/competitor filtering), and the internal-links
//! stage.

use serde::{Deserialize, Serialize};

/// Company profile backing tone, voice, and E-E-A-T metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyContext {
    pub name: String,
    pub url: String,
    /// Registrable host (no scheme, no leading `www.`)
    pub domain: String,
    pub description: String,
    pub tone: String,
    pub language: String,
    pub market: String,
    /// Competitor domains excluded from citations and internal links
    pub competitors: Vec<String>,
}

impl CompanyContext {
    /// True when `url` points at this company's own domain
    pub fn owns_url(&self, url: &str) -> bool {
        domain_of(url).is_some_and(|d| d == self.domain)
    }

    /// True when `url` points at a configured competitor domain
    pub fn is_competitor_url(&self, url: &str) -> bool {
        domain_of(url)
            .is_some_and(|d| self.competitors.iter().any(|c| d == normalize_domain(c)))
    }
}

/// Extract the normalized host from a URL string
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_domain)
}

fn normalize_domain(host: &str) -> String {
    host.trim()
        .to_ascii_lowercase()
        .trim_start_matches("www.")
        .to_string()
}

// =============================================================================
// Linkable Pool
// =============================================================================

/// Page classification for sitemap entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Blog,
    Product,
    Service,
    Docs,
    Resource,
    Other,
}

impl PageKind {
    /// Base relevance before keyword scoring, on the [0, 10] scale
    pub fn base_confidence(&self) -> f64 {
        match self {
            Self::Blog => 6.0,
            Self::Docs => 5.0,
            Self::Resource => 5.0,
            Self::Product => 4.0,
            Self::Service => 4.0,
            Self::Other => 2.0,
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blog => write!(f, "blog"),
            Self::Product => write!(f, "product"),
            Self::Service => write!(f, "service"),
            Self::Docs => write!(f, "docs"),
            Self::Resource => write!(f, "resource"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A candidate internal-link target discovered from the sitemap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkableUrl {
    pub url: String,
    /// Human-readable title derived from the URL slug (or page metadata)
    pub title: String,
    pub kind: PageKind,
    /// Relevance score, clamped into [0, 10]
    pub confidence: f64,
}

impl LinkableUrl {
    pub fn new(url: impl Into<String>, title: impl Into<String>, kind: PageKind) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            kind,
            confidence: kind.base_confidence(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 10.0);
        self
    }
}

/// Ordered set of candidate internal links
pub type LinkablePool = Vec<LinkableUrl>;

// =============================================================================
// Tests
// =============================================================================
