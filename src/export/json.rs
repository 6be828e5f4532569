//! JSON Export
//!
//! The validated article serialized as-is: the flat mapping, including the
//! merged `_citation_map`, `metadata`, and parallel-stage keys.

use std::path::{Path, PathBuf};

use crate::types::article::ValidatedArticle;
use crate::types::Result;

pub fn export(article: &ValidatedArticle, path: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(article)?;
    std::fs::write(path, json)?;
    Ok(path.to_path_buf())
}
