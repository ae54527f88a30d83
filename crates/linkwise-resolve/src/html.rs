//! Extract readable text from rendered Wikipedia article HTML.

use once_cell::sync::Lazy;
use regex::Regex;

static CONTENT_MARKER: &str = "id=\"mw-content-text\"";

static STRIP_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(table|style|script|sup|figure)\b[^>]*>.*?</(?:table|style|script|sup|figure)>")
        .unwrap()
});
static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap());
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<h1[^>]*id="firstHeading"[^>]*>(.*?)</h1>"#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// First `max_paragraphs` non-empty paragraphs of the main content, joined
/// by blank lines. Empty when nothing readable was found.
pub(crate) fn extract_paragraphs(html: &str, max_paragraphs: usize) -> String {
    let content = match html.find(CONTENT_MARKER) {
        Some(pos) => &html[pos..],
        None => html,
    };
    let cleaned = STRIP_BLOCK_RE.replace_all(content, " ");

    PARAGRAPH_RE
        .captures_iter(&cleaned)
        .filter_map(|cap| cap.get(1))
        .map(|m| to_text(m.as_str()))
        .filter(|p| !p.is_empty())
        .take(max_paragraphs)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Article title from the page heading.
pub(crate) fn first_heading(html: &str) -> Option<String> {
    HEADING_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| to_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn to_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}
