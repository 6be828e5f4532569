//! Markdown Export
//!
//! Readable article rendering with a minimal HTML-to-markdown pass:
//! paragraphs, lists, emphasis, and links survive; other tags are
//! stripped.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{citation_rows, field, qa_items, sections, takeaways, toc_entries};
use crate::text;
use crate::types::article::ValidatedArticle;
use crate::types::Result;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s[^>]*href="(?P<href>[^"]*)"[^>]*>(?P<label>.*?)</a>"#)
        .expect("valid link regex")
});

pub fn export(article: &ValidatedArticle, path: &Path) -> Result<PathBuf> {
    let markdown = render(article);
    std::fs::write(path, markdown)?;
    Ok(path.to_path_buf())
}

pub fn render(article: &ValidatedArticle) -> String {
    let mut out = String::with_capacity(8 * 1024);

    out.push_str(&format!("# {}\n\n", field(article, "Headline")));
    let subtitle = field(article, "Subtitle");
    if !subtitle.is_empty() {
        out.push_str(&format!("*{}*\n\n", subtitle));
    }

    out.push_str(&html_to_markdown(field(article, "Intro")));
    out.push_str(&html_to_markdown(field(article, "Direct_Answer")));

    let toc = toc_entries(article);
    if !toc.is_empty() {
        out.push_str("## Contents\n\n");
        for (label, anchor) in &toc {
            out.push_str(&format!("- [{}](#{})\n", label, anchor));
        }
        out.push('\n');
    }

    for (title, content) in sections(article) {
        out.push_str(&format!("## {}\n\n", title));
        out.push_str(&html_to_markdown(&content));
    }

    let takeaways = takeaways(article);
    if !takeaways.is_empty() {
        out.push_str("## Key Takeaways\n\n");
        for takeaway in &takeaways {
            out.push_str(&format!("- {}\n", takeaway));
        }
        out.push('\n');
    }

    for (key, heading) in [("faq", "FAQ"), ("paa", "People Also Ask")] {
        let items = qa_items(article, key);
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("## {}\n\n", heading));
        for (question, answer) in &items {
            out.push_str(&format!("**{}**\n\n{}\n\n", question, answer));
        }
    }

    let citations = citation_rows(article);
    if !citations.is_empty() {
        out.push_str("## Sources\n\n");
        for (n, url, title) in &citations {
            out.push_str(&format!("{}. [{}]({})\n", n, if title.is_empty() { url } else { title }, url));
        }
        out.push('\n');
    }

    out
}

/// Minimal HTML-to-markdown conversion for article body fragments
fn html_to_markdown(html: &str) -> String {
    // links first, so their labels survive the tag strip
    let linked = LINK_RE.replace_all(html, "[$label]($href)");
    let block = linked
        .replace("</p>", "\n\n")
        .replace("</li>", "\n")
        .replace("<li>", "- ")
        .replace("</ul>", "\n")
        .replace("</ol>", "\n")
        .replace("<strong>", "**")
        .replace("</strong>", "**")
        .replace("<em>", "*")
        .replace("</em>", "*");

    let mut out = String::with_capacity(block.len());
    for line in block.lines() {
        // strip the remaining tags per line, preserving markdown markers
        let cleaned = strip_tags_keep_text(line);
        out.push_str(cleaned.trim_end());
        out.push('\n');
    }
    let trimmed = out.trim().to_string();
    if trimmed.is_empty() {
        trimmed
    } else {
        format!("{}\n\n", trimmed)
    }
}

fn strip_tags_keep_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    text::normalizer::strip_html(&out) // decode entities, collapse whitespace
}
