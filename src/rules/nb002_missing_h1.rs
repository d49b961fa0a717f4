use crate::issue::{Issue, IssueCategory};
use crate::rule::{Rule, RuleScope, ScanResult};
use crate::rules::heading_utils::HeadingOutline;

/// The notebook needs a level-one heading somewhere.
///
/// Reported on the first markdown cell; a notebook without markdown cells
/// has nowhere to report it and is left alone.
#[derive(Debug, Clone, Default)]
pub struct NB002MissingH1;

impl Rule for NB002MissingH1 {
    fn name(&self) -> &'static str {
        "NB002"
    }

    fn description(&self) -> &'static str {
        "Notebook should contain a level-one heading"
    }

    fn categories(&self) -> &'static [IssueCategory] {
        &[IssueCategory::Header]
    }

    fn scope(&self) -> RuleScope {
        RuleScope::Document
    }

    fn check_document(&self, outline: &HeadingOutline) -> ScanResult {
        if outline.has_h1() {
            return Ok(Vec::new());
        }
        Ok(outline.first_markdown_cell.iter().cloned().map(Issue::missing_h1).collect())
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(NB002MissingH1)
    }
}
