//! Lightweight HTML fragment parsing
//!
//! The alt-text rules only care about start tags and their attributes, so
//! the default parser extracts exactly that: every start tag outside of
//! comments and raw-text elements, with attributes decoded the way a browser
//! would read them. Like a browser it never rejects input: a tag cut off by
//! the end of the text is dropped. Rules depend on the [`HtmlParser`] trait,
//! which keeps them testable with stub parsers.

use regex::Regex;
use std::sync::LazyLock;

static TAG_START_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)(?:[\s/>]|$)").unwrap());

// Elements whose content is text, not markup
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'=<>/`]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});

/// Errors raised by parsers that refuse to guess about malformed markup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HtmlParseError {
    #[error("unterminated <{tag}> tag starting at byte {offset}")]
    UnterminatedTag { tag: String, offset: usize },

    #[error("unbalanced quote in attributes of <{tag}> at byte {offset}")]
    UnbalancedQuote { tag: String, offset: usize },
}

/// A start tag and its attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    /// Attributes in source order; `None` for bare attributes like `hidden`
    pub attributes: Vec<(String, Option<String>)>,
    /// Byte offset of the `<` in the parsed string
    pub byte_offset: usize,
}

impl Element {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }

    /// Attribute value; bare attributes read as the empty string, like the DOM
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }
}

/// Flat list of the start tags found in a fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlFragment {
    pub elements: Vec<Element>,
}

impl HtmlFragment {
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.iter().filter(move |element| element.name == name)
    }
}

pub trait HtmlParser: Send + Sync {
    fn parse(&self, html: &str) -> Result<HtmlFragment, HtmlParseError>;
}

/// Default parser: start tags only, comments and raw text skipped. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagScanner;

impl HtmlParser for TagScanner {
    fn parse(&self, html: &str) -> Result<HtmlFragment, HtmlParseError> {
        let comments = comment_ranges(html);
        // ASCII lowercasing keeps byte offsets
        let lowered = html.to_ascii_lowercase();
        let mut elements = Vec::new();
        // Tags may contain '<' inside quoted attributes, so resume after each tag end
        let mut search_from = 0;

        while let Some(cap) = TAG_START_REGEX.captures_at(html, search_from) {
            let (Some(full), Some(name_match)) = (cap.get(0), cap.get(1)) else {
                break;
            };
            let start = full.start();

            if let Some(&(_, comment_end)) = comments.iter().find(|(s, e)| start >= *s && start < *e) {
                search_from = comment_end;
                continue;
            }

            let name = name_match.as_str().to_ascii_lowercase();
            let attrs_start = name_match.end();
            let Some(tag_end) = find_tag_end(html, attrs_start) else {
                // Cut off by the end of the input; a browser drops it
                log::debug!("Dropping unterminated <{name}> tag at byte {start}");
                break;
            };

            let attributes = parse_attributes(&html[attrs_start..tag_end]);
            search_from = if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                raw_text_end(&lowered, &name, tag_end + 1)
            } else {
                tag_end + 1
            };
            elements.push(Element {
                name,
                attributes,
                byte_offset: start,
            });
        }

        Ok(HtmlFragment { elements })
    }
}

/// Position of the `>` closing a tag, honouring quoted attribute values.
/// `None` when the input ends first, inside a quote or not.
fn find_tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in html[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(from + offset),
            (None, _) => {}
        }
    }
    None
}

/// Where scanning resumes after the content of a raw-text element: its
/// closing tag, or the end of the input when it is never closed
fn raw_text_end(lowered: &str, name: &str, from: usize) -> usize {
    let closing = format!("</{name}");
    lowered[from..]
        .find(&closing)
        .map(|offset| from + offset)
        .unwrap_or(lowered.len())
}

fn parse_attributes(raw: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE_REGEX
        .captures_iter(raw)
        .map(|cap| {
            let key = cap[1].to_ascii_lowercase();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().to_string());
            (key, value)
        })
        .collect()
}

/// Byte ranges of `<!-- ... -->` comments; an unclosed comment runs to the end
fn comment_ranges(html: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut pos = 0;
    while let Some(found) = html[pos..].find("<!--") {
        let start = pos + found;
        let end = html[start + 4..]
            .find("-->")
            .map(|e| start + 4 + e + 3)
            .unwrap_or(html.len());
        ranges.push((start, end));
        pos = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> HtmlFragment {
        TagScanner.parse(html).unwrap()
    }

    #[test]
    fn test_attributes_in_all_quote_styles() {
        let fragment = parse(r#"<img src="a.png" alt='A plot' width=300 hidden>"#);
        let img = &fragment.elements[0];
        assert_eq!(img.name, "img");
        assert_eq!(img.attribute("src"), Some("a.png"));
        assert_eq!(img.attribute("alt"), Some("A plot"));
        assert_eq!(img.attribute("width"), Some("300"));
        assert_eq!(img.attribute("hidden"), Some(""));
        assert!(img.has_attribute("hidden"));
        assert!(!img.has_attribute("title"));
    }

    #[test]
    fn test_tag_names_are_case_insensitive() {
        let fragment = parse(r#"<IMG SRC="x.png" ALT="x">"#);
        let img = fragment.elements_named("img").next().unwrap();
        assert_eq!(img.attribute("alt"), Some("x"));
    }

    #[test]
    fn test_gt_inside_quoted_value() {
        let fragment = parse(r#"<img alt="a > b" src="x.png"><p>"#);
        assert_eq!(fragment.elements.len(), 2);
        assert_eq!(fragment.elements[0].attribute("alt"), Some("a > b"));
        assert_eq!(fragment.elements[1].name, "p");
    }

    #[test]
    fn test_comments_are_skipped() {
        let fragment = parse("<!-- <img src=\"x.png\"> --><p>text</p>");
        assert_eq!(fragment.elements_named("img").count(), 0);
        assert_eq!(fragment.elements_named("p").count(), 1);
    }

    #[test]
    fn test_self_closing_tag() {
        let fragment = parse(r#"<img src="x.png" />"#);
        let img = &fragment.elements[0];
        assert_eq!(img.attribute("src"), Some("x.png"));
        assert!(!img.has_attribute("alt"));
    }

    #[test]
    fn test_plain_text_has_no_elements() {
        assert!(parse("a < b and c > d").elements.is_empty());
        // Inline math is not a tag
        assert!(parse("$a<b$ holds").elements.is_empty());
    }

    #[test]
    fn test_unterminated_tag_is_dropped() {
        let fragment = parse("<p>ok</p><img src=\"x.png\"");
        assert_eq!(fragment.elements.len(), 1);
        assert_eq!(fragment.elements[0].name, "p");
    }

    #[test]
    fn test_unbalanced_quote_is_dropped() {
        assert!(parse("<img alt=\"oops>").elements.is_empty());
    }

    #[test]
    fn test_prose_less_than_is_not_an_error() {
        let fragment = parse("Loop while i<n is true.");
        assert!(fragment.elements.is_empty());
    }

    #[test]
    fn test_script_and_style_bodies_are_raw_text() {
        let html = r#"<script type="text/javascript">
var s = '<img src="fake.png">'; if (a <b) { go(); }
</SCRIPT><style>p > a { color: red }</style><img src="real.png">"#;
        let fragment = parse(html);
        let names: Vec<_> = fragment.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["script", "style", "img"]);
        assert_eq!(fragment.elements[2].attribute("src"), Some("real.png"));
    }

    #[test]
    fn test_unclosed_script_hides_the_rest() {
        let fragment = parse("<script>document.write('<img src=x>')");
        assert_eq!(fragment.elements.len(), 1);
        assert_eq!(fragment.elements[0].name, "script");
    }
}
