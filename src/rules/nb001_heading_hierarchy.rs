use crate::issue::{Issue, IssueCategory};
use crate::notebook::CellId;
use crate::rule::{Rule, RuleScope, ScanResult};
use crate::rules::heading_utils::{HeadingEntry, HeadingOutline};

/// A heading that breaks the document outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyViolation {
    pub cell_id: CellId,
    pub current: usize,
    pub expected: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Deeper than one level below the previous heading
    LevelSkip,
    /// Shallower than the deepest level used so far
    BelowMax,
}

/// Walk the document's headings and report every outline violation.
///
/// The first heading seeds both the running level and the deepest level;
/// it is never itself reported. The deepest level only grows.
pub fn validate_hierarchy(entries: &[HeadingEntry]) -> Vec<HierarchyViolation> {
    let Some(first) = entries.first() else {
        return Vec::new();
    };

    let mut previous_level = first.level;
    let mut highest_level = first.level;
    let mut violations = Vec::new();

    for entry in &entries[1..] {
        if entry.level > previous_level + 1 {
            violations.push(HierarchyViolation {
                cell_id: entry.cell_id.clone(),
                current: entry.level,
                expected: previous_level + 1,
                kind: ViolationKind::LevelSkip,
            });
        } else if entry.level < highest_level {
            violations.push(HierarchyViolation {
                cell_id: entry.cell_id.clone(),
                current: entry.level,
                expected: highest_level,
                kind: ViolationKind::BelowMax,
            });
        }
        previous_level = entry.level;
        highest_level = highest_level.max(entry.level);
    }

    violations
}

/// Heading levels should deepen one step at a time
#[derive(Debug, Clone, Default)]
pub struct NB001HeadingHierarchy;

impl Rule for NB001HeadingHierarchy {
    fn name(&self) -> &'static str {
        "NB001"
    }

    fn description(&self) -> &'static str {
        "Heading levels should only increment by one level at a time"
    }

    fn categories(&self) -> &'static [IssueCategory] {
        &[IssueCategory::Header]
    }

    fn scope(&self) -> RuleScope {
        RuleScope::Document
    }

    fn check_document(&self, outline: &HeadingOutline) -> ScanResult {
        Ok(validate_hierarchy(&outline.entries)
            .into_iter()
            .map(|v| Issue::heading_level(v.cell_id, v.current, v.expected))
            .collect())
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(NB001HeadingHierarchy)
    }
}
