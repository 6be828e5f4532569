//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/blogforge/) and project (blogforge.toml)
//! level configuration; per-run inputs live in `JobConfig`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ai::provider::ProviderConfig;
use crate::constants::{concurrency, network, pipeline as pipeline_constants};
use crate::types::{ForgeError, Result};

// =============================================================================
// Export Formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Html,
    Markdown,
    Json,
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Pdf => write!(f, "pdf"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "pdf" => Ok(Self::Pdf),
            other => Err(ForgeError::Config(format!(
                "Unknown export format: {} (supported: html, markdown, json, csv, xlsx, pdf)",
                other
            ))),
        }
    }
}

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: ProviderConfig,

    /// Pipeline tuning
    pub pipeline: PipelineConfig,

    /// Export settings
    pub export: ExportConfig,

    /// Citation handling
    pub citations: CitationsConfig,

    /// Network / probing settings
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: ProviderConfig::default(),
            pipeline: PipelineConfig::default(),
            export: ExportConfig::default(),
            citations: CitationsConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ForgeError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ForgeError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ForgeError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.pipeline.word_count_target < 300 {
            return Err(ForgeError::Config(format!(
                "word_count_target must be at least 300, got {}",
                self.pipeline.word_count_target
            )));
        }
        if self.pipeline.max_regenerations > 5 {
            return Err(ForgeError::Config(format!(
                "max_regenerations must be at most 5, got {}",
                self.pipeline.max_regenerations
            )));
        }
        if self.network.probe_concurrency == 0 {
            return Err(ForgeError::Config(
                "probe_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.export.formats.is_empty() {
            return Err(ForgeError::Config(
                "at least one export format is required".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub word_count_target: usize,
    pub max_regenerations: u32,
    pub enable_images: bool,
    /// Randomize the publication date within the freshness window
    pub randomize_publication_date: bool,
    pub freshness_window_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            word_count_target: pipeline_constants::DEFAULT_WORD_COUNT,
            max_regenerations: pipeline_constants::MAX_REGENERATIONS,
            enable_images: true,
            randomize_publication_date: false,
            freshness_window_days: pipeline_constants::FRESHNESS_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub formats: Vec<ExportFormat>,
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Html, ExportFormat::Json],
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationsConfig {
    /// Competitor domains excluded from citations and internal links
    pub competitors: Vec<String>,
    /// Topic keyword -> domain-level authority URLs substituted for dead
    /// sources. The "default" key applies when no topic matches.
    pub authority_fallbacks: BTreeMap<String, Vec<String>>,
}

impl Default for CitationsConfig {
    fn default() -> Self {
        let mut authority_fallbacks = BTreeMap::new();
        authority_fallbacks.insert(
            "default".to_string(),
            vec![
                "https://www.nist.gov/".to_string(),
                "https://www.pewresearch.org/".to_string(),
                "https://hbr.org/".to_string(),
            ],
        );
        authority_fallbacks.insert(
            "security".to_string(),
            vec![
                "https://www.cisa.gov/".to_string(),
                "https://www.nist.gov/cyberframework".to_string(),
                "https://www.sans.org/".to_string(),
            ],
        );
        Self {
            competitors: Vec::new(),
            authority_fallbacks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_timeout_secs: u64,
    pub probe_concurrency: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: network::PROBE_TIMEOUT_SECS,
            probe_concurrency: concurrency::PROBE_CONCURRENCY,
        }
    }
}

// =============================================================================
// Job Configuration (per-run inputs)
// =============================================================================

/// Immutable inputs for one article generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Primary keyword the article targets (required, non-empty)
    pub primary_keyword: String,
    /// Company URL (required, valid URL)
    pub company_url: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tone_override: Option<String>,
    pub word_count_target: usize,
    pub export_formats: Vec<ExportFormat>,
    pub max_regenerations: u32,
    pub enable_images: bool,
    /// Free text inserted into the generation prompt verbatim
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
}

impl JobConfig {
    /// Build a job from the effective config plus the two required seeds
    pub fn new(config: &Config, primary_keyword: &str, company_url: &str) -> Self {
        Self {
            primary_keyword: primary_keyword.trim().to_string(),
            company_url: company_url.trim().to_string(),
            market: None,
            language: None,
            tone_override: None,
            word_count_target: config.pipeline.word_count_target,
            export_formats: config.export.formats.clone(),
            max_regenerations: config.pipeline.max_regenerations,
            enable_images: config.pipeline.enable_images,
            custom_instructions: None,
            competitors: config.citations.competitors.clone(),
        }
    }

    /// Fatal input validation, run before Stage 0
    pub fn validate(&self) -> Result<()> {
        if self.primary_keyword.trim().is_empty() {
            return Err(ForgeError::Input("primary_keyword is required".to_string()));
        }
        let parsed = url::Url::parse(&self.company_url)
            .map_err(|e| ForgeError::Input(format!("invalid company_url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ForgeError::Input(format!(
                "company_url must be http(s), got {}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(ForgeError::Input("company_url has no host".to_string()));
        }
        if self.export_formats.is_empty() {
            return Err(ForgeError::Input(
                "at least one export format is required".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_temperature_range_checked() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("html".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_job_validation() {
        let config = Config::default();
        let good = JobConfig::new(&config, "zero trust architecture", "https://example.com");
        assert!(good.validate().is_ok());

        let empty_keyword = JobConfig::new(&config, "  ", "https://example.com");
        assert!(matches!(
            empty_keyword.validate().unwrap_err(),
            ForgeError::Input(_)
        ));

        let bad_url = JobConfig::new(&config, "kw", "not-a-url");
        assert!(matches!(bad_url.validate().unwrap_err(), ForgeError::Input(_)));

        let ftp = JobConfig::new(&config, "kw", "ftp://example.com");
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn test_authority_fallback_defaults() {
        let citations = CitationsConfig::default();
        assert!(citations.authority_fallbacks.contains_key("default"));
        assert!(!citations.authority_fallbacks["default"].is_empty());
    }
}
