//! Citation Linker
//!
//! Pure rewrite of inline `[N]` citation markers into anchor links using a
//! citation map. Markers inside existing `<a>` elements are never touched,
//! which also makes the transform idempotent. Markers without a map entry
//! are removed.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::citation::CitationMap;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid marker regex"));

/// Rewrite `[N]` markers in `html` into citation anchors.
///
/// Running the result through `linkify` again yields the same string.
pub fn linkify(html: &str, map: &CitationMap) -> String {
    let mut out = String::with_capacity(html.len());
    let mut anchor_depth: usize = 0;
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        let text = &rest[..open];
        if anchor_depth == 0 {
            out.push_str(&replace_markers(text, map));
        } else {
            out.push_str(text);
        }

        match rest[open..].find('>') {
            Some(close) => {
                let tag = &rest[open..open + close + 1];
                let lower = tag.to_ascii_lowercase();
                if lower.starts_with("<a ") || lower == "<a>" {
                    anchor_depth += 1;
                } else if lower.starts_with("</a") {
                    anchor_depth = anchor_depth.saturating_sub(1);
                }
                out.push_str(tag);
                rest = &rest[open + close + 1..];
            }
            None => {
                // Unterminated tag: emit as-is
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        if anchor_depth == 0 {
            out.push_str(&replace_markers(rest, map));
        } else {
            out.push_str(rest);
        }
    }
    out
}

fn replace_markers(text: &str, map: &CitationMap) -> String {
    MARKER_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let n: u32 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => return String::new(),
            };
            match map.get(&n) {
                Some(citation) => {
                    let label = if citation.title.trim().is_empty() {
                        format!("[{}]", n)
                    } else {
                        escape_text(citation.title.trim())
                    };
                    format!(
                        r#"<a href="{}" class="citation" rel="nofollow noopener">{}</a>"#,
                        escape_attr(&citation.url),
                        label
                    )
                }
                None => String::new(),
            }
        })
        .into_owned()
}

/// Markers present in `html` (outside anchors) that have no map entry.
pub fn unresolved_markers(html: &str, map: &CitationMap) -> Vec<u32> {
    markers_outside_anchors(html)
        .into_iter()
        .filter(|n| !map.contains_key(n))
        .collect()
}

/// All `[N]` markers that sit outside `<a>` elements.
pub fn markers_outside_anchors(html: &str) -> Vec<u32> {
    let mut found = Vec::new();
    let mut anchor_depth: usize = 0;
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        if anchor_depth == 0 {
            collect_markers(&rest[..open], &mut found);
        }
        match rest[open..].find('>') {
            Some(close) => {
                let lower = rest[open..open + close + 1].to_ascii_lowercase();
                if lower.starts_with("<a ") || lower == "<a>" {
                    anchor_depth += 1;
                } else if lower.starts_with("</a") {
                    anchor_depth = anchor_depth.saturating_sub(1);
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    if anchor_depth == 0 {
        collect_markers(rest, &mut found);
    }
    found
}

fn collect_markers(text: &str, found: &mut Vec<u32>) {
    for caps in MARKER_RE.captures_iter(text) {
        if let Ok(n) = caps[1].parse() {
            found.push(n);
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('"', "%22")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::citation::Citation;

    fn map_with(entries: &[(u32, &str, &str)]) -> CitationMap {
        entries
            .iter()
            .map(|(n, url, title)| {
                (
                    *n,
                    Citation {
                        url: url.to_string(),
                        title: title.to_string(),
                        kind: "source".to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_linkify_basic() {
        let map = map_with(&[(1, "https://example.org/report", "2024 breach report")]);
        let out = linkify("<p>Attacks rose sharply [1] last year.</p>", &map);
        assert_eq!(
            out,
            r#"<p>Attacks rose sharply <a href="https://example.org/report" class="citation" rel="nofollow noopener">2024 breach report</a> last year.</p>"#
        );
    }

    #[test]
    fn test_linkify_unmapped_marker_removed() {
        let map = CitationMap::new();
        let out = linkify("<p>Claim [7] stands.</p>", &map);
        assert_eq!(out, "<p>Claim  stands.</p>");
    }

    #[test]
    fn test_linkify_skips_existing_anchors() {
        let map = map_with(&[(2, "https://example.org", "example")]);
        let input = r#"<p><a href="/x">keep [2] here</a> but link [2].</p>"#;
        let out = linkify(input, &map);
        assert!(out.contains("keep [2] here"));
        assert!(out.contains(r#"class="citation""#));
    }

    #[test]
    fn test_linkify_idempotent() {
        let map = map_with(&[(1, "https://example.org", "a & b report")]);
        let once = linkify("<p>See [1] and [2].</p>", &map);
        let twice = linkify(&once, &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_linkify_untitled_uses_marker_label() {
        let map = map_with(&[(3, "https://example.org", "")]);
        let out = linkify("x [3] y", &map);
        assert!(out.contains(">[3]</a>"));
        // still idempotent: the [3] label sits inside the anchor
        assert_eq!(linkify(&out, &map), out);
    }

    #[test]
    fn test_unresolved_markers() {
        let map = map_with(&[(1, "https://example.org", "t")]);
        let unresolved = unresolved_markers("<p>[1] [4] <a href=\"/\">[9]</a></p>", &map);
        assert_eq!(unresolved, vec![4]);
    }

    #[test]
    fn test_markers_outside_anchors() {
        let found = markers_outside_anchors("a [1] <a>[2]</a> [3]");
        assert_eq!(found, vec![1, 3]);
    }
}
