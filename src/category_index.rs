//! Live index of open issues, grouped by category
//!
//! The index belongs to one open document and is mutated in place for that
//! document's whole lifetime, so anything drawn from it (section handles,
//! entry order) stays stable across edits. It tracks two things:
//!
//! - the listed entries per category, deduplicated by label according to
//!   [`LabelDedup`], in insertion order;
//! - every detection per cell, which drives the per-cell "has issues"
//!   marker. A detection suppressed from the list by label dedup still
//!   marks its cell.

use crate::config::LabelDedup;
use crate::issue::{CategoryHelp, Issue, IssueCategory, SeverityData};
use crate::notebook::CellId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Identity of a rendered category section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SectionHandle(u64);

/// One listed issue, with everything the rendering layer draws for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRecord {
    pub cell_id: CellId,
    pub label: String,
    pub category: IssueCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<SeverityData>,
    pub help: &'static CategoryHelp,
}

impl IssueRecord {
    fn from_issue(issue: Issue) -> Self {
        Self {
            help: issue.category.help(),
            cell_id: issue.cell_id,
            label: issue.signature,
            category: issue.category,
            severity: issue.severity,
        }
    }

    fn is(&self, cell_id: &CellId, label: &str) -> bool {
        &self.cell_id == cell_id && self.label == label
    }
}

#[derive(Debug, Clone)]
struct Section {
    handle: SectionHandle,
    entries: Vec<IssueRecord>,
}

/// A non-empty category as handed to the rendering layer
#[derive(Debug, Clone, Serialize)]
pub struct SectionView<'a> {
    pub category: IssueCategory,
    pub title: &'static str,
    pub help: &'static CategoryHelp,
    pub entries: &'a [IssueRecord],
}

#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    sections: BTreeMap<IssueCategory, Section>,
    /// Every detected label per cell and category, listed or not
    detections: HashMap<CellId, BTreeMap<IssueCategory, BTreeSet<String>>>,
    label_dedup: LabelDedup,
    next_handle: u64,
    /// Incremented on every change
    version: u64,
}

impl CategoryIndex {
    pub fn new(label_dedup: LabelDedup) -> Self {
        Self {
            label_dedup,
            ..Default::default()
        }
    }

    pub fn label_dedup(&self) -> LabelDedup {
        self.label_dedup
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Register the section for `category`, returning its handle. Registering
    /// an existing section returns the same handle and changes nothing.
    pub fn add_section(&mut self, category: IssueCategory) -> SectionHandle {
        if let Some(section) = self.sections.get(&category) {
            return section.handle;
        }
        let handle = SectionHandle(self.next_handle);
        self.next_handle += 1;
        self.sections.insert(
            category,
            Section {
                handle,
                entries: Vec::new(),
            },
        );
        self.bump();
        handle
    }

    pub fn section(&self, category: IssueCategory) -> Option<SectionHandle> {
        self.sections.get(&category).map(|section| section.handle)
    }

    /// Whether a new `(cell_id, label)` entry would duplicate a listed one
    fn is_listed(&self, cell_id: &CellId, label: &str) -> bool {
        let mut entries = self.sections.values().flat_map(|section| section.entries.iter());
        match self.label_dedup {
            LabelDedup::Document => entries.any(|entry| entry.label == label),
            LabelDedup::Cell => entries.any(|entry| entry.is(cell_id, label)),
        }
    }

    /// Add an issue. Returns `false` when an equal label is already listed
    /// (see [`LabelDedup`]) and the entry was skipped; the detection is still
    /// recorded for the cell marker.
    pub fn add_issue(&mut self, cell_id: CellId, signature: impl Into<String>, category: IssueCategory) -> bool {
        self.add(Issue::new(category, cell_id, signature))
    }

    /// [`add_issue`](Self::add_issue), keeping the issue's severity data
    pub fn add(&mut self, issue: Issue) -> bool {
        let newly_detected = self
            .detections
            .entry(issue.cell_id.clone())
            .or_default()
            .entry(issue.category)
            .or_default()
            .insert(issue.signature.clone());

        if self.is_listed(&issue.cell_id, &issue.signature) {
            if newly_detected {
                self.bump();
            }
            return false;
        }

        self.add_section(issue.category);
        if let Some(section) = self.sections.get_mut(&issue.category) {
            section.entries.push(IssueRecord::from_issue(issue));
        }
        self.bump();
        true
    }

    /// Replace, in one step, what `cell_id` has in `categories` with `issues`.
    ///
    /// Entries that still reproduce keep their place; entries that no longer
    /// reproduce are removed; new issues are appended. Categories not named
    /// are left untouched.
    pub fn replace_cell_issues(&mut self, cell_id: &CellId, categories: &[IssueCategory], issues: Vec<Issue>) {
        let wanted: HashSet<(IssueCategory, &str)> = issues
            .iter()
            .filter(|issue| &issue.cell_id == cell_id)
            .map(|issue| (issue.category, issue.signature.as_str()))
            .collect();

        let mut removed = 0;
        for category in categories {
            if let Some(section) = self.sections.get_mut(category) {
                let before = section.entries.len();
                section
                    .entries
                    .retain(|entry| &entry.cell_id != cell_id || wanted.contains(&(entry.category, entry.label.as_str())));
                removed += before - section.entries.len();
            }
        }

        let mut detections_changed = false;
        if let Some(by_category) = self.detections.get_mut(cell_id) {
            for category in categories {
                detections_changed |= by_category.remove(category).is_some();
            }
            if by_category.is_empty() {
                self.detections.remove(cell_id);
            }
        }
        if removed > 0 || detections_changed {
            self.bump();
        }

        for issue in issues {
            if &issue.cell_id != cell_id {
                log::warn!(
                    "Ignoring issue '{}' for cell {} while replacing issues of cell {}",
                    issue.signature,
                    issue.cell_id,
                    cell_id
                );
                continue;
            }
            if !categories.contains(&issue.category) {
                log::warn!("Ignoring issue '{}' outside the replaced categories", issue.signature);
                continue;
            }
            self.add(issue);
        }
    }

    /// Remove one entry and its detection. Returns whether anything was removed.
    pub fn remove_issue(&mut self, cell_id: &CellId, signature: &str, category: IssueCategory) -> bool {
        let mut removed = false;

        if let Some(section) = self.sections.get_mut(&category) {
            let before = section.entries.len();
            section.entries.retain(|entry| !entry.is(cell_id, signature));
            removed |= section.entries.len() != before;
        }

        if let Some(by_category) = self.detections.get_mut(cell_id) {
            if let Some(labels) = by_category.get_mut(&category) {
                removed |= labels.remove(signature);
                if labels.is_empty() {
                    by_category.remove(&category);
                }
            }
            if by_category.is_empty() {
                self.detections.remove(cell_id);
            }
        }

        if removed {
            self.bump();
        }
        removed
    }

    /// Drop every entry and detection of one cell
    pub fn clear_cell(&mut self, cell_id: &CellId) -> usize {
        let mut removed = 0;
        for section in self.sections.values_mut() {
            let before = section.entries.len();
            section.entries.retain(|entry| &entry.cell_id != cell_id);
            removed += before - section.entries.len();
        }
        let had_detections = self.detections.remove(cell_id).is_some();
        if removed > 0 || had_detections {
            self.bump();
        }
        removed
    }

    /// Keep only what belongs to cells in `live_cells`. Returns the number
    /// of listed entries dropped.
    pub fn reconcile(&mut self, live_cells: &HashSet<CellId>) -> usize {
        let mut removed = 0;
        for section in self.sections.values_mut() {
            let before = section.entries.len();
            section.entries.retain(|entry| live_cells.contains(&entry.cell_id));
            removed += before - section.entries.len();
        }

        let before = self.detections.len();
        self.detections.retain(|cell_id, _| live_cells.contains(cell_id));
        if removed > 0 || before != self.detections.len() {
            self.bump();
        }
        removed
    }

    /// Non-empty categories in section order, entries in insertion order
    pub fn enumerate(&self) -> Vec<SectionView<'_>> {
        self.sections
            .iter()
            .filter(|(_, section)| !section.entries.is_empty())
            .map(|(category, section)| SectionView {
                category: *category,
                title: category.section_title(),
                help: category.help(),
                entries: &section.entries,
            })
            .collect()
    }

    pub fn entries(&self, category: IssueCategory) -> &[IssueRecord] {
        self.sections
            .get(&category)
            .map(|section| section.entries.as_slice())
            .unwrap_or_default()
    }

    /// Whether the cell has at least one detection (drives the cell marker)
    pub fn has_issues(&self, cell_id: &CellId) -> bool {
        self.detections.contains_key(cell_id)
    }

    /// Categories detected for one cell
    pub fn cell_categories(&self, cell_id: &CellId) -> Vec<IssueCategory> {
        self.detections
            .get(cell_id)
            .map(|by_category| by_category.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every cell with at least one detection, sorted by id
    pub fn flagged_cells(&self) -> Vec<&CellId> {
        let mut cells: Vec<&CellId> = self.detections.keys().collect();
        cells.sort();
        cells
    }

    /// Number of listed entries across all categories
    pub fn len(&self) -> usize {
        self.sections.values().map(|section| section.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries and detections. Section handles survive.
    pub fn clear(&mut self) {
        for section in self.sections.values_mut() {
            section.entries.clear();
        }
        self.detections.clear();
        self.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_ALT: &str = "Cell Error: Missing Alt Tag";

    fn cell(id: &str) -> CellId {
        CellId::from(id)
    }

    fn pair(cell_id: &str, label: &str) -> (String, String) {
        (cell_id.to_string(), label.to_string())
    }

    fn labels(index: &CategoryIndex, category: IssueCategory) -> Vec<(String, String)> {
        index
            .entries(category)
            .iter()
            .map(|e| (e.cell_id.to_string(), e.label.clone()))
            .collect()
    }

    #[test]
    fn test_add_issue_twice_keeps_one_entry() {
        let mut index = CategoryIndex::default();
        assert!(index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText));
        assert!(!index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText));
        assert_eq!(index.len(), 1);
        assert!(index.has_issues(&cell("a")));
    }

    #[test]
    fn test_add_section_is_idempotent() {
        let mut index = CategoryIndex::default();
        let first = index.add_section(IssueCategory::Header);
        let version = index.version();
        let second = index.add_section(IssueCategory::Header);
        assert_eq!(first, second);
        assert_eq!(index.version(), version);
        assert_ne!(index.add_section(IssueCategory::AltText), first);
    }

    #[test]
    fn test_document_dedup_skips_same_label_for_other_cell() {
        let mut index = CategoryIndex::new(LabelDedup::Document);
        assert!(index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText));
        assert!(!index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText));
        assert_eq!(labels(&index, IssueCategory::AltText), vec![pair("a", MISSING_ALT)]);
        // Both cells are still marked
        assert!(index.has_issues(&cell("b")));
        assert_eq!(index.flagged_cells(), vec![&cell("a"), &cell("b")]);
    }

    #[test]
    fn test_document_dedup_crosses_categories() {
        let mut index = CategoryIndex::new(LabelDedup::Document);
        index.add_issue(cell("a"), "same text", IssueCategory::Contrast);
        assert!(!index.add_issue(cell("b"), "same text", IssueCategory::Transparency));
        assert!(index.entries(IssueCategory::Transparency).is_empty());
    }

    #[test]
    fn test_cell_dedup_lists_each_cell() {
        let mut index = CategoryIndex::new(LabelDedup::Cell);
        assert!(index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText));
        assert!(index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText));
        assert!(!index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText));
        assert_eq!(index.entries(IssueCategory::AltText).len(), 2);
    }

    #[test]
    fn test_reconcile_keeps_only_live_cells() {
        let mut index = CategoryIndex::new(LabelDedup::Cell);
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText);
        index.add_issue(cell("b"), "Header format: Missing h1 header", IssueCategory::Header);

        let live: HashSet<CellId> = [cell("a")].into_iter().collect();
        assert_eq!(index.reconcile(&live), 2);
        assert_eq!(labels(&index, IssueCategory::AltText), vec![pair("a", MISSING_ALT)]);
        assert!(index.entries(IssueCategory::Header).is_empty());
        assert!(!index.has_issues(&cell("b")));

        // Nothing more to drop
        let version = index.version();
        assert_eq!(index.reconcile(&live), 0);
        assert_eq!(index.version(), version);
    }

    #[test]
    fn test_enumerate_skips_empty_sections_in_order() {
        let mut index = CategoryIndex::default();
        index.add_section(IssueCategory::Contrast);
        index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText);
        index.add_issue(cell("a"), "Heading format: expecting h2, got h3", IssueCategory::Header);

        let views = index.enumerate();
        let titles: Vec<_> = views.iter().map(|v| v.title).collect();
        assert_eq!(titles, vec!["Header Errors", "Alt Text Errors"]);
        assert_eq!(views[1].entries[0].cell_id, cell("b"));
        assert_eq!(views[1].help.link, "https://www.w3.org/TR/WCAG20-TECHS/H37.html");
    }

    #[test]
    fn test_replace_keeps_position_of_surviving_entries() {
        let mut index = CategoryIndex::new(LabelDedup::Cell);
        index.add_issue(cell("a"), "Heading format: expecting h2, got h3", IssueCategory::Header);
        index.add_issue(cell("b"), "Heading format: expecting h3, got h4", IssueCategory::Header);
        index.add_issue(cell("a"), "Header format: Missing h1 header", IssueCategory::Header);

        index.replace_cell_issues(
            &cell("a"),
            &[IssueCategory::Header],
            vec![Issue::heading_level(cell("a"), 3, 2)],
        );

        assert_eq!(
            labels(&index, IssueCategory::Header),
            vec![
                pair("a", "Heading format: expecting h2, got h3"),
                pair("b", "Heading format: expecting h3, got h4"),
            ]
        );
    }

    #[test]
    fn test_replace_with_nothing_clears_marker() {
        let mut index = CategoryIndex::default();
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        index.replace_cell_issues(&cell("a"), &IssueCategory::CONTENT, Vec::new());
        assert!(index.is_empty());
        assert!(!index.has_issues(&cell("a")));
    }

    #[test]
    fn test_replace_leaves_other_categories_alone() {
        let mut index = CategoryIndex::default();
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        index.add_issue(cell("a"), "AI Suggestion: x", IssueCategory::AiSuggestion);
        index.replace_cell_issues(&cell("a"), &[IssueCategory::AltText], Vec::new());
        assert_eq!(index.len(), 1);
        assert_eq!(index.cell_categories(&cell("a")), vec![IssueCategory::AiSuggestion]);
    }

    #[test]
    fn test_remove_issue() {
        let mut index = CategoryIndex::default();
        index.add_issue(cell("a"), "AI Suggestion: x", IssueCategory::AiSuggestion);
        assert!(index.remove_issue(&cell("a"), "AI Suggestion: x", IssueCategory::AiSuggestion));
        assert!(!index.remove_issue(&cell("a"), "AI Suggestion: x", IssueCategory::AiSuggestion));
        assert!(index.is_empty());
        assert!(!index.has_issues(&cell("a")));
    }

    #[test]
    fn test_clear_cell() {
        let mut index = CategoryIndex::new(LabelDedup::Cell);
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        index.add_issue(cell("a"), "Header format: Missing h1 header", IssueCategory::Header);
        index.add_issue(cell("b"), MISSING_ALT, IssueCategory::AltText);
        assert_eq!(index.clear_cell(&cell("a")), 2);
        assert_eq!(index.len(), 1);
        assert!(!index.has_issues(&cell("a")));
    }

    #[test]
    fn test_severity_is_kept() {
        let mut index = CategoryIndex::default();
        index.add(Issue::heading_level(cell("a"), 4, 2));
        assert_eq!(
            index.entries(IssueCategory::Header)[0].severity,
            Some(SeverityData::HeadingLevel { current: 4, expected: 2 })
        );
    }

    #[test]
    fn test_version_increment() {
        let mut index = CategoryIndex::default();
        assert_eq!(index.version(), 0);
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        let version = index.version();
        assert!(version > 0);
        index.add_issue(cell("a"), MISSING_ALT, IssueCategory::AltText);
        assert_eq!(index.version(), version);
        index.clear();
        assert!(index.version() > version);
    }
}
