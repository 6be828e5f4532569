//! Text Normalization Primitives
//!
//! Pure text transforms shared by the merge stage, the quality gate, and the
//! exporters:
//!
//! - Entity encoding of text runs between HTML tags
//! - Removal of em-dash / en-dash characters
//! - HTML stripping for plain-text fields
//! - Slug generation for anchor IDs
//!
//! All functions are free of I/O and idempotent.

/// Split `input` into alternating tag and text tokens.
///
/// A tag token is a `<...>` run; everything else is a text run. Unterminated
/// `<` is treated as text so malformed input cannot swallow content.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        if open > 0 {
            tokens.push(Token::Text(&rest[..open]));
        }
        match rest[open..].find('>') {
            Some(close) => {
                tokens.push(Token::Tag(&rest[open..open + close + 1]));
                rest = &rest[open + close + 1..];
            }
            None => {
                // Unterminated tag: keep as text
                tokens.push(Token::Text(&rest[open..]));
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

/// Encode residual `&` characters in text runs to `&amp;`, leaving tags and
/// existing entities untouched.
pub fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for token in tokenize(input) {
        match token {
            Token::Tag(tag) => out.push_str(tag),
            Token::Text(text) => encode_text_run(text, &mut out),
        }
    }
    out
}

fn encode_text_run(text: &str, out: &mut String) {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' {
            if let Some(len) = entity_len(&text[i..]) {
                out.push_str(&text[i..i + len]);
                i += len;
            } else {
                out.push_str("&amp;");
                i += 1;
            }
        } else {
            let start = i;
            while i < bytes.len() && bytes[i] != b'&' {
                i += 1;
            }
            out.push_str(&text[start..i]);
        }
    }
}

/// Length of a known entity starting at `s` (which begins with `&`), or None.
///
/// Recognizes named entities (`&amp;`, `&lt;`, ... any `&[a-zA-Z]+;`) and
/// numeric entities (`&#123;`).
fn entity_len(s: &str) -> Option<usize> {
    let rest = &s[1..];
    if let Some(stripped) = rest.strip_prefix('#') {
        let digits = stripped.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && stripped[digits..].starts_with(';') {
            return Some(2 + digits + 1);
        }
        return None;
    }
    let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters > 0 && rest[letters..].starts_with(';') {
        return Some(1 + letters + 1);
    }
    None
}

/// Replace em-dash (U+2014) and en-dash (U+2013) everywhere.
///
/// When the dash sits between letters on both sides it becomes ` - `
/// (space-hyphen-space); otherwise a bare `-`. Existing hyphens are
/// preserved.
pub fn strip_dashes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '\u{2014}' || ch == '\u{2013}' {
            let prev_letter = i > 0 && chars[i - 1].is_alphabetic();
            let next_letter = chars.get(i + 1).is_some_and(|c| c.is_alphabetic());
            if prev_letter && next_letter {
                out.push_str(" - ");
            } else {
                out.push('-');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// True if the string contains an em-dash or en-dash.
pub fn contains_dashes(input: &str) -> bool {
    input.contains('\u{2014}') || input.contains('\u{2013}')
}

/// Remove all HTML tags, decode the common entities, and collapse whitespace.
///
/// Used to enforce the plain-text field invariant and for word counting.
pub fn strip_html(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    for token in tokenize(input) {
        if let Token::Text(t) = token {
            text.push_str(t);
        }
    }
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if the string contains anything that looks like an HTML tag.
pub fn contains_html(input: &str) -> bool {
    tokenize(input)
        .iter()
        .any(|t| matches!(t, Token::Tag(_)))
}

/// Count words in a possibly-HTML string.
pub fn word_count(input: &str) -> usize {
    strip_html(input).split_whitespace().count()
}

/// Build an anchor-safe slug from a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Check that tags are balanced per field (light validation for the gate).
///
/// Only paired container tags are tracked; void elements (`<br>`, `<img>`,
/// `<hr>`) and closing mismatches deeper than nesting are reported as issues.
pub fn check_tag_balance(input: &str) -> Vec<String> {
    const VOID: [&str; 5] = ["br", "img", "hr", "meta", "input"];
    let mut stack: Vec<String> = Vec::new();
    let mut issues = Vec::new();

    for token in tokenize(input) {
        let Token::Tag(tag) = token else { continue };
        let inner = tag.trim_start_matches('<').trim_end_matches('>').trim();
        if inner.starts_with('!') || inner.ends_with('/') {
            continue;
        }
        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim().to_ascii_lowercase();
            match stack.pop() {
                Some(open) if open == name => {}
                Some(open) => issues.push(format!("expected </{}>, found </{}>", open, name)),
                None => issues.push(format!("unmatched closing tag </{}>", name)),
            }
        } else {
            let name: String = inner
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            if name.is_empty() || VOID.contains(&name.as_str()) {
                continue;
            }
            stack.push(name);
        }
    }
    for open in stack {
        issues.push(format!("unclosed tag <{}>", open));
    }
    issues
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_entities_plain_ampersand() {
        assert_eq!(encode_entities("fish & chips"), "fish &amp; chips");
    }

    #[test]
    fn test_encode_entities_preserves_existing() {
        assert_eq!(encode_entities("fish &amp; chips"), "fish &amp; chips");
        assert_eq!(encode_entities("a &lt; b"), "a &lt; b");
        assert_eq!(encode_entities("&#8212; stays"), "&#8212; stays");
    }

    #[test]
    fn test_encode_entities_skips_tags() {
        let html = r#"<a href="/x?a=1&b=2">R&D</a>"#;
        assert_eq!(
            encode_entities(html),
            r#"<a href="/x?a=1&b=2">R&amp;D</a>"#
        );
    }

    #[test]
    fn test_encode_entities_unknown_entity_encoded() {
        // `&foo` without a terminating semicolon is not an entity
        assert_eq!(encode_entities("AT&T"), "AT&amp;T");
        assert_eq!(encode_entities("x &notreal y"), "x &amp;notreal y");
        // but a well-formed named entity is left alone even if exotic
        assert_eq!(encode_entities("&hellip;"), "&hellip;");
    }

    #[test]
    fn test_strip_dashes_between_letters() {
        assert_eq!(
            strip_dashes("AI\u{2014}a revolution \u{2014} today"),
            "AI - a revolution - today"
        );
    }

    #[test]
    fn test_strip_dashes_en_dash() {
        assert_eq!(strip_dashes("2019\u{2013}2024"), "2019-2024");
    }

    #[test]
    fn test_strip_dashes_preserves_hyphens() {
        assert_eq!(strip_dashes("zero-trust model"), "zero-trust model");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello <strong>world</strong></p>"),
            "Hello world"
        );
        assert_eq!(strip_html("a &amp; b"), "a & b");
    }

    #[test]
    fn test_contains_html() {
        assert!(contains_html("<p>x</p>"));
        assert!(!contains_html("plain text, 2 < 3 without tags? no: a<b has no close"));
        assert!(!contains_html("no tags here"));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("<p>one two three</p>"), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("What Is Zero Trust?"), "what-is-zero-trust");
        assert_eq!(slugify("  FAQs & PAA  "), "faqs-paa");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_check_tag_balance() {
        assert!(check_tag_balance("<p>ok</p>").is_empty());
        assert!(check_tag_balance("<p><ul><li>x</li></ul></p>").is_empty());
        assert_eq!(check_tag_balance("<p>open").len(), 1);
        assert_eq!(check_tag_balance("</p>").len(), 1);
        assert!(check_tag_balance("<p>a<br>b</p>").is_empty());
    }

    #[test]
    fn test_tokenize_unterminated_tag_kept_as_text() {
        assert_eq!(encode_entities("a < b & c"), "a < b &amp; c");
    }

    proptest! {
        #[test]
        fn prop_encode_entities_idempotent(s in ".{0,200}") {
            let once = encode_entities(&s);
            prop_assert_eq!(encode_entities(&once), once);
        }

        #[test]
        fn prop_strip_dashes_idempotent(s in ".{0,200}") {
            let once = strip_dashes(&s);
            prop_assert_eq!(strip_dashes(&once), once);
        }

        #[test]
        fn prop_strip_dashes_removes_all(s in ".{0,200}") {
            prop_assert!(!contains_dashes(&strip_dashes(&s)));
        }

        #[test]
        fn prop_slugify_idempotent(s in ".{0,80}") {
            let once = slugify(&s);
            prop_assert_eq!(slugify(&once), once);
        }
    }
}
