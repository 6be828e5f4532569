//! HTML Export
//!
//! Full standalone document: head metadata (description, Open Graph,
//! Twitter card, canonical, robots, author), body sections in declared
//! order, FAQ/PAA with FAQPage JSON-LD, and an Article JSON-LD block whose
//! `citation` array comes from the citation map. Content arrives fully
//! linked and entity-safe; nothing is re-transformed here.

use std::path::{Path, PathBuf};

use serde_json::json;

use super::{
    citation_rows, escape, field, metadata_str, qa_items, sections, takeaways, toc_entries,
};
use crate::types::article::ValidatedArticle;
use crate::types::Result;

pub fn export(article: &ValidatedArticle, path: &Path) -> Result<PathBuf> {
    let html = render(article);
    std::fs::write(path, html)?;
    Ok(path.to_path_buf())
}

pub fn render(article: &ValidatedArticle) -> String {
    let headline = field(article, "Headline");
    let meta_description = field(article, "Meta_Description");
    let canonical = metadata_str(article, "canonical_url");
    let published = metadata_str(article, "publication_date");
    let author = metadata_str(article, "author");
    let organization = metadata_str(article, "organization");
    let hero_image = article
        .get("image_urls")
        .and_then(|v| v.get("hero"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(headline)));
    out.push_str(&format!(
        "<meta name=\"description\" content=\"{}\">\n",
        escape(meta_description)
    ));
    out.push_str("<meta name=\"robots\" content=\"index, follow\">\n");
    if !author.is_empty() {
        out.push_str(&format!("<meta name=\"author\" content=\"{}\">\n", escape(author)));
    }
    if !canonical.is_empty() {
        out.push_str(&format!("<link rel=\"canonical\" href=\"{}\">\n", escape(canonical)));
    }

    // Open Graph
    out.push_str(&format!(
        "<meta property=\"og:title\" content=\"{}\">\n",
        escape(headline)
    ));
    out.push_str(&format!(
        "<meta property=\"og:description\" content=\"{}\">\n",
        escape(meta_description)
    ));
    out.push_str("<meta property=\"og:type\" content=\"article\">\n");
    if !canonical.is_empty() {
        out.push_str(&format!("<meta property=\"og:url\" content=\"{}\">\n", escape(canonical)));
    }
    if !hero_image.is_empty() {
        out.push_str(&format!(
            "<meta property=\"og:image\" content=\"{}\">\n",
            escape(hero_image)
        ));
    }
    if !published.is_empty() {
        out.push_str(&format!(
            "<meta property=\"article:published_time\" content=\"{}\">\n",
            escape(published)
        ));
    }

    // Twitter card
    out.push_str("<meta name=\"twitter:card\" content=\"summary_large_image\">\n");
    out.push_str(&format!(
        "<meta name=\"twitter:title\" content=\"{}\">\n",
        escape(headline)
    ));
    out.push_str(&format!(
        "<meta name=\"twitter:description\" content=\"{}\">\n",
        escape(meta_description)
    ));

    out.push_str(&json_ld(article, headline, canonical, published, author, organization));
    out.push_str("</head>\n<body>\n<article>\n");

    // Header
    out.push_str(&format!("<h1>{}</h1>\n", escape(headline)));
    let subtitle = field(article, "Subtitle");
    if !subtitle.is_empty() {
        out.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape(subtitle)));
    }
    if !author.is_empty() || !published.is_empty() {
        out.push_str(&format!(
            "<p class=\"byline\">{}{}{}</p>\n",
            escape(author),
            if author.is_empty() || published.is_empty() { "" } else { " · " },
            escape(published.split('T').next().unwrap_or(published)),
        ));
    }
    if !hero_image.is_empty() {
        out.push_str(&format!(
            "<img class=\"hero\" src=\"{}\" alt=\"{}\">\n",
            escape(hero_image),
            escape(headline)
        ));
    }

    // Lead
    out.push_str(&format!(
        "<section class=\"intro\">{}</section>\n",
        field(article, "Intro")
    ));
    out.push_str(&format!(
        "<section class=\"direct-answer\">{}</section>\n",
        field(article, "Direct_Answer")
    ));

    // Table of contents
    let toc = toc_entries(article);
    if !toc.is_empty() {
        out.push_str("<nav class=\"toc\"><ul>\n");
        for (label, anchor) in &toc {
            out.push_str(&format!(
                "<li><a href=\"#{}\">{}</a></li>\n",
                escape(anchor),
                escape(label)
            ));
        }
        out.push_str("</ul></nav>\n");
    }

    // Sections, with the mid image half-way through
    let sections = sections(article);
    let mid_image = article
        .get("image_urls")
        .and_then(|v| v.get("mid"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let midpoint = sections.len() / 2;
    for (i, (title, content)) in sections.iter().enumerate() {
        if i == midpoint && !mid_image.is_empty() {
            out.push_str(&format!("<img class=\"mid\" src=\"{}\" alt=\"\">\n", escape(mid_image)));
        }
        let anchor = crate::text::slugify(title);
        out.push_str(&format!("<h2 id=\"{}\">{}</h2>\n", escape(&anchor), escape(title)));
        out.push_str(&format!("<section>{}</section>\n", content));
    }

    // Tables
    if let Some(tables) = article.get("tables").and_then(|v| v.as_array()) {
        for table in tables {
            render_table(table, &mut out);
        }
    }

    // Key takeaways
    let takeaways = takeaways(article);
    if !takeaways.is_empty() {
        out.push_str("<section class=\"takeaways\"><h2>Key Takeaways</h2><ul>\n");
        for takeaway in &takeaways {
            out.push_str(&format!("<li>{}</li>\n", escape(takeaway)));
        }
        out.push_str("</ul></section>\n");
    }

    // FAQ and PAA
    for (key, heading) in [("faq", "Frequently Asked Questions"), ("paa", "People Also Ask")] {
        let items = qa_items(article, key);
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "<section class=\"{}\"><h2>{}</h2>\n",
            key, heading
        ));
        for (question, answer) in &items {
            out.push_str(&format!(
                "<h3>{}</h3>\n<p>{}</p>\n",
                escape(question),
                escape(answer)
            ));
        }
        out.push_str("</section>\n");
    }

    // Sources and related reading
    let citations_html = field(article, "citations_html");
    if !citations_html.is_empty() {
        out.push_str("<section class=\"sources\"><h2>Sources</h2>\n");
        out.push_str(citations_html);
        out.push_str("\n</section>\n");
    }
    let related = article
        .get("internal_links")
        .and_then(|v| v.get("html"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !related.is_empty() {
        out.push_str("<section class=\"related\"><h2>Related Reading</h2>\n");
        out.push_str(related);
        out.push_str("\n</section>\n");
    }

    let bottom_image = article
        .get("image_urls")
        .and_then(|v| v.get("bottom"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !bottom_image.is_empty() {
        out.push_str(&format!(
            "<img class=\"bottom\" src=\"{}\" alt=\"\">\n",
            escape(bottom_image)
        ));
    }

    out.push_str("</article>\n</body>\n</html>\n");
    out
}

fn render_table(table: &serde_json::Value, out: &mut String) {
    let headers = table.get("headers").and_then(|v| v.as_array());
    let rows = table.get("rows").and_then(|v| v.as_array());
    let (Some(headers), Some(rows)) = (headers, rows) else {
        return;
    };

    out.push_str("<table>\n");
    if let Some(title) = table.get("title").and_then(|v| v.as_str())
        && !title.is_empty()
    {
        out.push_str(&format!("<caption>{}</caption>\n", escape(title)));
    }
    out.push_str("<thead><tr>");
    for header in headers {
        out.push_str(&format!("<th>{}</th>", escape(header.as_str().unwrap_or(""))));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row.as_array().map(|c| c.as_slice()).unwrap_or(&[]) {
            out.push_str(&format!("<td>{}</td>", escape(cell.as_str().unwrap_or(""))));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
}

/// FAQPage + Article JSON-LD blocks
fn json_ld(
    article: &ValidatedArticle,
    headline: &str,
    canonical: &str,
    published: &str,
    author: &str,
    organization: &str,
) -> String {
    let mut out = String::new();

    let faq = qa_items(article, "faq");
    if !faq.is_empty() {
        let entities: Vec<serde_json::Value> = faq
            .iter()
            .map(|(question, answer)| {
                json!({
                    "@type": "Question",
                    "name": question,
                    "acceptedAnswer": {"@type": "Answer", "text": answer}
                })
            })
            .collect();
        let faq_ld = json!({
            "@context": "https://schema.org",
            "@type": "FAQPage",
            "mainEntity": entities
        });
        out.push_str(&format!(
            "<script type=\"application/ld+json\">{}</script>\n",
            faq_ld
        ));
    }

    let citations: Vec<String> = citation_rows(article)
        .into_iter()
        .map(|(_, url, _)| url)
        .collect();
    let hero_image = article
        .get("image_urls")
        .and_then(|v| v.get("hero"))
        .and_then(|v| v.as_str());
    let article_ld = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": headline,
        "datePublished": published,
        "author": {"@type": "Person", "name": author},
        "publisher": {"@type": "Organization", "name": organization},
        "image": hero_image,
        "mainEntityOfPage": canonical,
        "citation": citations,
    });
    out.push_str(&format!(
        "<script type=\"application/ld+json\">{}</script>\n",
        article_ld
    ));
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn article() -> ValidatedArticle {
        let mut map = Map::new();
        map.insert("Headline".into(), Value::String("Guide & Primer".into()));
        map.insert("Subtitle".into(), Value::String("A subtitle".into()));
        map.insert(
            "Meta_Description".into(),
            Value::String("Description \"quoted\"".into()),
        );
        map.insert("Intro".into(), Value::String("<p>Intro.</p>".into()));
        map.insert(
            "Direct_Answer".into(),
            Value::String("<p>Answer.</p>".into()),
        );
        map.insert("section_01_title".into(), Value::String("First?".into()));
        map.insert(
            "section_01_content".into(),
            Value::String("<p>Body.</p>".into()),
        );
        map.insert(
            "faq".into(),
            json!([{"question": "Q1?", "answer": "A1"}]),
        );
        map.insert("paa".into(), json!([]));
        map.insert(
            "metadata".into(),
            json!({
                "canonical_url": "https://example.com/blog/guide",
                "publication_date": "2026-07-01T00:00:00Z",
                "author": "Example Editorial Team",
                "organization": "Example",
            }),
        );
        map.insert(
            "_citation_map".into(),
            json!({"1": {"url": "https://example.org/src", "title": "Src", "kind": "source"}}),
        );
        map.insert("citations_html".into(), Value::String("<ul><li>s</li></ul>".into()));
        map
    }

    #[test]
    fn test_head_contract() {
        let html = render(&article());
        assert!(html.contains("<title>Guide &amp; Primer</title>"));
        assert!(html.contains("name=\"description\" content=\"Description &quot;quoted&quot;\""));
        assert!(html.contains("rel=\"canonical\" href=\"https://example.com/blog/guide\""));
        assert!(html.contains("og:type\" content=\"article\""));
        assert!(html.contains("article:published_time"));
        assert!(html.contains("twitter:card\" content=\"summary_large_image\""));
        assert!(html.contains("name=\"robots\" content=\"index, follow\""));
        assert!(html.contains("name=\"author\""));
    }

    #[test]
    fn test_json_ld_blocks() {
        let html = render(&article());
        assert!(html.contains("\"@type\":\"FAQPage\""));
        assert!(html.contains("\"@type\":\"Article\""));
        assert!(html.contains("https://example.org/src"));
    }

    #[test]
    fn test_body_order_and_sources() {
        let html = render(&article());
        let intro_pos = html.find("class=\"intro\"").unwrap();
        let answer_pos = html.find("class=\"direct-answer\"").unwrap();
        let section_pos = html.find("<h2 id=\"first\">").unwrap();
        let sources_pos = html.find("class=\"sources\"").unwrap();
        assert!(intro_pos < answer_pos);
        assert!(answer_pos < section_pos);
        assert!(section_pos < sources_pos);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = export(&article(), &dir.path().join("index.html")).unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("<!DOCTYPE html>"));
    }
}
