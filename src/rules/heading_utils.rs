use crate::notebook::{Cell, CellId};
use fancy_regex::Regex as FancyRegex;
use regex::Regex;
use std::sync::LazyLock;

// ATX headings; a marker without a following space is not a heading
static MARKDOWN_HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(#+) [ \t]*(.*)$").unwrap());

// Inline HTML headings; the closing tag must match the opening level
static HTML_HEADING_REGEX: LazyLock<FancyRegex> =
    LazyLock::new(|| FancyRegex::new(r"(?i)<h([1-9])>(.*?)</h\1>").unwrap());

/// A heading found in a markdown cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// 1 for `#` / `<h1>`, 2 for `##` / `<h2>`, ...
    pub level: usize,
    pub text: String,
    pub cell_id: CellId,
}

/// Extract the headings of one cell.
///
/// Markdown headings come first, then HTML headings, each group in source
/// order. Order across the two syntaxes is therefore not source order.
/// Non-markdown cells have no headings.
pub fn extract_headings(cell: &Cell) -> Vec<HeadingEntry> {
    if !cell.is_markdown() {
        return Vec::new();
    }

    let text = cell.source.as_str();
    let mut headings = Vec::new();

    for cap in MARKDOWN_HEADING_REGEX.captures_iter(text) {
        let heading_text = cap[2].trim();
        if heading_text.is_empty() {
            continue;
        }
        headings.push(HeadingEntry {
            level: cap[1].len(),
            text: heading_text.to_string(),
            cell_id: cell.id.clone(),
        });
    }

    for cap in HTML_HEADING_REGEX.captures_iter(text) {
        let cap = match cap {
            Ok(cap) => cap,
            Err(e) => {
                // Backtracking limit; keep what was found so far
                log::warn!("Stopped scanning HTML headings in cell {}: {}", cell.id, e);
                break;
            }
        };
        let (Some(level), Some(inner)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let heading_text = inner.as_str().trim();
        if heading_text.is_empty() {
            continue;
        }
        headings.push(HeadingEntry {
            level: level.as_str().parse().unwrap_or(1),
            text: heading_text.to_string(),
            cell_id: cell.id.clone(),
        });
    }

    headings
}

/// All headings of a document in cell order, plus what the outline rules
/// need to know about the document as a whole
#[derive(Debug, Clone, Default)]
pub struct HeadingOutline {
    pub entries: Vec<HeadingEntry>,
    /// First markdown cell, where document-level heading issues are reported
    pub first_markdown_cell: Option<CellId>,
}

impl HeadingOutline {
    pub fn from_cells(cells: &[Cell]) -> Self {
        let entries = cells.iter().flat_map(extract_headings).collect();
        let first_markdown_cell = cells.iter().find(|cell| cell.is_markdown()).map(|cell| cell.id.clone());
        Self {
            entries,
            first_markdown_cell,
        }
    }

    pub fn has_h1(&self) -> bool {
        self.entries.iter().any(|entry| entry.level == 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
