//! Export Subsystem
//!
//! Per-format emitters over the validated article, with per-format fault
//! isolation: one failing format never aborts the others. The article
//! arriving here is fully linked and entity-safe; emitters never transform
//! content, they only render it.

mod csv_export;
mod html;
mod json;
mod markdown;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::config::ExportFormat;
use crate::types::article::ValidatedArticle;
use crate::types::{ForgeError, Result};

/// File-based exporter writing into a per-job directory
pub struct FileExporter;

impl FileExporter {
    pub fn new() -> Self {
        Self
    }

    /// Export every requested format; failures are collected, not raised.
    /// Returns (format name -> path, error descriptions).
    pub fn export_all(
        &self,
        article: &ValidatedArticle,
        formats: &[ExportFormat],
        dir: &Path,
    ) -> (BTreeMap<String, PathBuf>, Vec<String>) {
        let mut paths = BTreeMap::new();
        let mut failures = Vec::new();

        for format in formats {
            match self.export_one(article, *format, dir) {
                Ok(path) => {
                    info!(format = %format, path = %path.display(), "Exported");
                    paths.insert(format.to_string(), path);
                }
                Err(e) => {
                    warn!(format = %format, "Export failed: {}", e);
                    failures.push(format!("{} export failed: {}", format, e));
                }
            }
        }
        (paths, failures)
    }

    fn export_one(
        &self,
        article: &ValidatedArticle,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<PathBuf> {
        match format {
            ExportFormat::Html => html::export(article, &dir.join("index.html")),
            ExportFormat::Json => json::export(article, &dir.join("article.json")),
            ExportFormat::Markdown => markdown::export(article, &dir.join("article.md")),
            ExportFormat::Csv => csv_export::export(article, &dir.join("article.csv")),
            ExportFormat::Xlsx | ExportFormat::Pdf => Err(ForgeError::Exporter {
                format: format.to_string(),
                message: "format not built in".to_string(),
            }),
        }
    }
}

impl Default for FileExporter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Shared field access over the flat mapping
// =============================================================================

pub(crate) fn field<'a>(article: &'a ValidatedArticle, key: &str) -> &'a str {
    article.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Non-empty (title, content) section pairs in declared order
pub(crate) fn sections(article: &ValidatedArticle) -> Vec<(String, String)> {
    (1..=9)
        .filter_map(|i| {
            let title = field(article, &format!("section_{:02}_title", i));
            let content = field(article, &format!("section_{:02}_content", i));
            (!title.is_empty() || !content.is_empty())
                .then(|| (title.to_string(), content.to_string()))
        })
        .collect()
}

/// (question, answer) pairs from the merged `faq` / `paa` arrays
pub(crate) fn qa_items(article: &ValidatedArticle, key: &str) -> Vec<(String, String)> {
    article
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let question = item.get("question")?.as_str()?.to_string();
                    let answer = item
                        .get("answer")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    Some((question, answer))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// (label, anchor) pairs from the merged `toc` array
pub(crate) fn toc_entries(article: &ValidatedArticle) -> Vec<(String, String)> {
    article
        .get("toc")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    Some((
                        entry.get("label")?.as_str()?.to_string(),
                        entry.get("anchor")?.as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn metadata_str<'a>(article: &'a ValidatedArticle, key: &str) -> &'a str {
    article
        .get("metadata")
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

pub(crate) fn takeaways(article: &ValidatedArticle) -> Vec<String> {
    (1..=3)
        .map(|i| field(article, &format!("key_takeaway_{:02}", i)).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// (marker, url, title) rows from `_citation_map`, ordered by marker
pub(crate) fn citation_rows(article: &ValidatedArticle) -> Vec<(u32, String, String)> {
    let Some(Value::Object(map)) = article.get("_citation_map") else {
        return Vec::new();
    };
    let mut rows: Vec<(u32, String, String)> = map
        .iter()
        .filter_map(|(n, citation)| {
            Some((
                n.parse().ok()?,
                citation.get("url")?.as_str()?.to_string(),
                citation
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ))
        })
        .collect();
    rows.sort_by_key(|(n, _, _)| *n);
    rows
}

/// HTML-escape a plain-text value for attribute/head insertion
pub(crate) fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
