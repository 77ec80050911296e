//! Markup helpers shared by the listing and detail parsers.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, Result};
use crate::utils::clean_text;

/// Tags that start a new line of text.
const BREAKING_TAGS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "tr", "td", "th", "dd", "dt", "h1", "h2", "h3", "h4",
];

static RE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z!/?]").expect("invalid regex: markup tag"));

/// Parse a fetched body as an HTML document.
///
/// The HTML parser itself accepts any input, so a body counts as
/// unparseable when it is empty, binary, or contains no tag at all.
pub fn parse_document(body: &str, url: &str) -> Result<Html> {
    if body.trim().is_empty() {
        return Err(AppError::structure(url, "empty body"));
    }
    if body.contains('\0') {
        return Err(AppError::structure(url, "body is binary, not markup"));
    }
    if !RE_TAG.is_match(body) {
        return Err(AppError::structure(url, "body contains no markup"));
    }
    Ok(Html::parse_document(body))
}

/// Compile a CSS selector.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text of an element split into lines at `<br>` and block boundaries.
///
/// Each line is whitespace-normalized; blank lines are dropped.
pub fn text_segments(element: ElementRef<'_>) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) if BREAKING_TAGS.contains(&el.name()) => {
                flush(&mut segments, &mut current);
            }
            _ => {}
        }
    }
    flush(&mut segments, &mut current);
    segments
}

/// Whitespace-normalized text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    text_segments(element).join(" ")
}

/// A short, char-safe excerpt of markup for error reports.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let cleaned = clean_text(text);
    match cleaned.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &cleaned[..idx]),
        None => cleaned,
    }
}

fn flush(segments: &mut Vec<String>, current: &mut String) {
    let line = clean_text(current);
    if !line.is_empty() {
        segments.push(line);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector("td:nth-child(2) a[href]").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_parse_document_rejects_non_markup() {
        for body in ["", "   \n", "{\"events\": []}", "plain text only", "ab\0cd<p>"] {
            assert!(
                matches!(
                    parse_document(body, "https://example.com"),
                    Err(AppError::Structure { .. })
                ),
                "accepted {body:?}"
            );
        }
    }

    #[test]
    fn test_parse_document_accepts_fragments() {
        assert!(parse_document("<p>hi</p>", "https://example.com").is_ok());
        assert!(parse_document("<!DOCTYPE html><html></html>", "https://example.com").is_ok());
    }

    #[test]
    fn test_text_segments_split_on_breaks_and_blocks() {
        let html = Html::parse_fragment(
            "<div id='v'>02.03.2024<br>09.03.2024<ul><li> 16.03.2024 </li><li>23.03.2024, <b>10 Uhr</b></li></ul></div>",
        );
        let sel = Selector::parse("#v").unwrap();
        let el = html.select(&sel).next().unwrap();
        assert_eq!(
            text_segments(el),
            vec!["02.03.2024", "09.03.2024", "16.03.2024", "23.03.2024, 10 Uhr"]
        );
        assert_eq!(
            element_text(el),
            "02.03.2024 09.03.2024 16.03.2024 23.03.2024, 10 Uhr"
        );
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        assert_eq!(excerpt("Größe   über alles", 5), "Größe…");
        assert_eq!(excerpt("kurz", 10), "kurz");
    }
}
