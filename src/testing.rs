//! Test Doubles
//!
//! Scripted implementations of the external collaborators so stage and
//! engine tests run without network access. Compiled only for tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::sync::Mutex;

use crate::ai::image::{GeneratedImage, ImageGenerator};
use crate::ai::provider::{LlmProvider, LlmResponse, ToolOptions};
use crate::config::JobConfig;
use crate::net::probe::{ProbeOutcome, UrlProber};
use crate::net::sitemap::CompanyResolver;
use crate::types::{CompanyContext, ForgeError, LinkablePool, Result};

// =============================================================================
// Scripted LLM Provider
// =============================================================================

type Handler = Box<dyn Fn(&str, &Value) -> Result<Value> + Send + Sync>;

/// Provider double driven by a closure; records every prompt it sees.
pub struct ScriptedProvider {
    handler: Handler,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(handler: impl Fn(&str, &Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the given value
    pub fn returning(value: Value) -> Self {
        Self::new(move |_, _| Ok(value.clone()))
    }

    /// Always returns a complete, well-formed article
    pub fn returning_article() -> Self {
        Self::returning(sample_article_value())
    }

    /// Always fails with an upstream error
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_, _| Err(ForgeError::LlmApi(message.clone())))
    }

    /// Prompts seen so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &str,
        schema: &Value,
        _tools: ToolOptions,
    ) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let content = (self.handler)(prompt, schema)?;
        let mut response = LlmResponse::content_only(content);
        response.grounding_count = 3;
        Ok(response)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-test"
    }
}

// =============================================================================
// Static URL Prober
// =============================================================================

/// Prober double with a fixed accept list (empty list = accept everything)
pub struct StaticProber {
    valid: Vec<String>,
    accept_all: bool,
    probed: DashMap<String, ProbeOutcome>,
}

impl StaticProber {
    pub fn accepting(valid: &[&str]) -> Self {
        Self {
            valid: valid.iter().map(|s| s.to_string()).collect(),
            accept_all: false,
            probed: DashMap::new(),
        }
    }

    pub fn accept_all() -> Self {
        Self {
            valid: Vec::new(),
            accept_all: true,
            probed: DashMap::new(),
        }
    }
}

#[async_trait]
impl UrlProber for StaticProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let outcome = if self.accept_all || self.valid.iter().any(|v| v == url) {
            ProbeOutcome::Valid(200)
        } else {
            ProbeOutcome::Invalid("status 404".to_string())
        };
        self.probed.insert(url.to_string(), outcome.clone());
        outcome
    }

    fn probed_urls(&self) -> Vec<String> {
        self.probed.iter().map(|e| e.key().clone()).collect()
    }
}

// =============================================================================
// Static Company Resolver
// =============================================================================

pub struct StaticResolver {
    pub company: CompanyContext,
    pub pool: LinkablePool,
}

impl StaticResolver {
    pub fn new(company: CompanyContext, pool: LinkablePool) -> Self {
        Self { company, pool }
    }

    /// example.com company with an empty pool
    pub fn example() -> Self {
        Self::new(sample_company(), Vec::new())
    }
}

#[async_trait]
impl CompanyResolver for StaticResolver {
    async fn resolve(&self, _job: &JobConfig) -> Result<(CompanyContext, LinkablePool)> {
        Ok((self.company.clone(), self.pool.clone()))
    }
}

// =============================================================================
// Image generator double
// =============================================================================

pub struct StaticImageGenerator;

#[async_trait]
impl ImageGenerator for StaticImageGenerator {
    async fn generate_image(&self, _prompt: &str, _aspect_ratio: &str) -> Result<GeneratedImage> {
        Ok(GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".to_string(),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn sample_company() -> CompanyContext {
    CompanyContext {
        name: "Example".into(),
        url: "https://example.com".into(),
        domain: "example.com".into(),
        description: "Example publishes security research.".into(),
        tone: "professional".into(),
        language: "en".into(),
        market: "global".into(),
        competitors: vec!["acme.com".into()],
    }
}

/// A complete, well-formed article payload in the LLM's flat key format.
///
/// Body content carries natural-language citations, conversational phrasing,
/// question patterns, and `[N]` markers so the quality gate scores it well.
pub fn sample_article_value() -> Value {
    let mut map = Map::new();
    map.insert(
        "Headline".into(),
        json!("Zero Trust Architecture: A Practical Guide"),
    );
    map.insert(
        "Subtitle".into(),
        json!("How modern teams verify every request without slowing delivery down"),
    );
    map.insert(
        "Teaser".into(),
        json!("Zero trust replaces the perimeter with continuous verification."),
    );
    map.insert("Meta_Title".into(), json!("Zero Trust Architecture Guide"))
;
    map.insert(
        "Meta_Description".into(),
        json!("What zero trust architecture is, how it works, and how to adopt it without disrupting your teams."),
    );
    map.insert(
        "Intro".into(),
        json!("<p>Have you ever wondered why a single stolen password can still sink an \
               entire network? According to research from NIST, perimeter-only defenses \
               fail once an attacker is inside [1]. You need a model that verifies every \
               request, every time. That is exactly what zero trust architecture does, \
               and this guide shows you how it works in practice.</p>"),
    );
    map.insert(
        "Direct_Answer".into(),
        json!("<p>Zero trust architecture is a security model that verifies every user \
               and device on every request instead of trusting a network location. \
               According to NIST guidance, it combines identity checks, least-privilege \
               access, and continuous monitoring to contain breaches quickly [1].</p>"),
    );

    let section_bodies = [
        "<p>What does zero trust actually mean day to day? According to NIST, the model \
         assumes breach and verifies each request explicitly [1]. You start with identity, \
         not with the network edge.</p>\
         <p>Research from Forrester shows that teams adopting this mindset cut lateral \
         movement dramatically [2]. A study by IBM found similar gains in containment \
         time [1].</p>\
         <ul><li>Verify explicitly</li><li>Use least privilege</li><li>Assume breach</li></ul>",
        "<p>How do you map your protect surface? Experts at CISA recommend starting with \
         the data and services attackers want most [2]. You then work outward to the \
         identities and devices that touch them.</p>\
         <p>According to a 2024 survey by Pew Research, most organizations begin with \
         identity providers because that is where policy lives [1]. That means you can \
         enforce rules without rewiring the network.</p>",
        "<p>Why does microsegmentation matter here? Analysts at Gartner report that \
         segmented networks contain incidents faster [2]. The data shows smaller blast \
         radii across the board.</p>\
         <p>Consider this: according to IBM's breach report, segmented environments save \
         significant recovery cost [1]. You get those savings by policy, not hardware.</p>",
        "<p>What about user experience? Research from Okta suggests single sign-on plus \
         adaptive checks keeps friction low [2]. In other words, security and usability \
         can improve together.</p>\
         <p>A report by McKinsey found that well-run rollouts keep login time flat while \
         risk drops [1]. That is the balance you are aiming for.</p>",
        "<p>How should you phase the rollout? According to CISA's maturity model, you \
         move identity first, then devices, then workloads [2]. Each phase has its own \
         quick wins.</p>\
         <p>Experts say a pilot on one critical app beats a big-bang migration [1]. You \
         can learn the policy language on low-risk traffic first, and that means less \
         rework later.</p>",
        "<p>Which metrics prove it is working? A study by SANS highlights time-to-contain \
         and policy coverage as the two that matter [2]. The data shows both improve \
         within two quarters.</p>\
         <p>According to NIST, continuous monitoring closes the loop [1]. That means your \
         dashboards become part of the control itself.</p>",
    ];
    let titles = [
        "What Is Zero Trust Architecture?",
        "How Do You Map the Protect Surface?",
        "Microsegmentation Without the Pain",
        "Balancing Security and User Experience",
        "A Phased Rollout That Works",
        "Measuring What Matters",
    ];
    for (i, (title, body)) in titles.iter().zip(section_bodies.iter()).enumerate() {
        map.insert(format!("section_{:02}_title", i + 1), json!(title));
        map.insert(format!("section_{:02}_content", i + 1), json!(body));
    }

    for (i, (q, a)) in [
        ("What is zero trust in simple terms?", "Never trust, always verify every request."),
        ("Is zero trust a product?", "No, it is an architecture and a set of principles."),
        ("How long does adoption take?", "Most teams phase it over 12 to 24 months."),
        ("Does zero trust replace VPNs?", "Often, yes; access brokers replace network tunnels."),
        ("Where should we start?", "Start with identity and one critical application."),
    ]
    .iter()
    .enumerate()
    {
        map.insert(format!("faq_{:02}_question", i + 1), json!(q));
        map.insert(format!("faq_{:02}_answer", i + 1), json!(a));
    }

    for (i, (q, a)) in [
        ("Why is zero trust important?", "It contains breaches that perimeter models miss."),
        ("What are the core pillars?", "Identity, devices, networks, applications, and data."),
        ("Who invented zero trust?", "The term was popularized by Forrester analysts."),
    ]
    .iter()
    .enumerate()
    {
        map.insert(format!("paa_{:02}_question", i + 1), json!(q));
        map.insert(format!("paa_{:02}_answer", i + 1), json!(a));
    }

    map.insert("key_takeaway_01".into(), json!("Verify every request explicitly."));
    map.insert("key_takeaway_02".into(), json!("Phase the rollout, identity first."));
    map.insert("key_takeaway_03".into(), json!("Measure containment time, not tool count."));

    map.insert(
        "tables".into(),
        json!([{
            "title": "Rollout phases",
            "headers": ["Phase", "Focus"],
            "rows": [["1", "Identity"], ["2", "Devices"], ["3", "Workloads"]]
        }]),
    );
    map.insert(
        "Sources".into(),
        json!("[1]: https://example.org/nist-zta - NIST zero trust publication\n\
               [2]: https://example.org/industry-report - Industry adoption report"),
    );
    map.insert("Search Queries".into(), json!("zero trust architecture\nzta adoption"));
    Value::Object(map)
}

/// JobConfig seeded for tests
pub fn sample_job() -> JobConfig {
    let config = crate::config::Config::default();
    JobConfig::new(&config, "zero trust architecture", "https://example.com")
}
