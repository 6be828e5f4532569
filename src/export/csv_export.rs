//! CSV Export
//!
//! One row per article field. Section rows carry their full content; the
//! writer handles quoting, so long HTML values survive untruncated.

use std::path::{Path, PathBuf};

use super::{citation_rows, field, qa_items, sections, takeaways};
use crate::types::article::ValidatedArticle;
use crate::types::{ForgeError, Result};

pub fn export(article: &ValidatedArticle, path: &Path) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| exporter_error(format!("cannot open {}: {}", path.display(), e)))?;

    writer
        .write_record(["field", "value"])
        .map_err(|e| exporter_error(e.to_string()))?;

    let mut write = |key: &str, value: &str| -> Result<()> {
        writer
            .write_record([key, value])
            .map_err(|e| exporter_error(e.to_string()))
    };

    for key in [
        "Headline",
        "Subtitle",
        "Teaser",
        "Meta_Title",
        "Meta_Description",
        "Intro",
        "Direct_Answer",
    ] {
        write(key, field(article, key))?;
    }
    for (i, (title, content)) in sections(article).iter().enumerate() {
        write(&format!("section_{:02}_title", i + 1), title)?;
        write(&format!("section_{:02}_content", i + 1), content)?;
    }
    for (prefix, key) in [("faq", "faq"), ("paa", "paa")] {
        for (i, (question, answer)) in qa_items(article, key).iter().enumerate() {
            write(&format!("{}_{:02}_question", prefix, i + 1), question)?;
            write(&format!("{}_{:02}_answer", prefix, i + 1), answer)?;
        }
    }
    for (i, takeaway) in takeaways(article).iter().enumerate() {
        write(&format!("key_takeaway_{:02}", i + 1), takeaway)?;
    }
    for (n, url, title) in citation_rows(article) {
        write(&format!("source_{:02}", n), &format!("{} - {}", url, title))?;
    }

    writer
        .flush()
        .map_err(|e| exporter_error(e.to_string()))?;
    Ok(path.to_path_buf())
}

fn exporter_error(message: String) -> ForgeError {
    ForgeError::Exporter {
        format: "csv".to_string(),
        message,
    }
}
