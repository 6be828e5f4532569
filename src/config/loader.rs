//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/blogforge/config.toml)
//! 3. Project config (blogforge.toml)
//! 4. Environment variables (BLOGFORGE_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{ForgeError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // BLOGFORGE_LLM__MODEL -> llm.model
        figment = figment.merge(Env::prefixed("BLOGFORGE_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| ForgeError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ForgeError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Global config directory (~/.config/blogforge/)
    pub fn global_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "blogforge")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Project config file path
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("blogforge.toml")
    }

    /// Effective config rendered as TOML (for `config show`)
    pub fn render(config: &Config) -> Result<String> {
        toml::to_string_pretty(config)
            .map_err(|e| ForgeError::Config(format!("Cannot render config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[pipeline]\nword_count_target = 2000\n\n[llm]\ntemperature = 0.2"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.word_count_target, 2000);
        assert!((config.llm.temperature - 0.2).abs() < 1e-6);
        // untouched defaults survive
        assert_eq!(config.pipeline.max_regenerations, 2);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[llm]\ntemperature = 9.0").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_render_roundtrip() {
        let rendered = ConfigLoader::render(&Config::default()).unwrap();
        assert!(rendered.contains("word_count_target"));
    }
}
