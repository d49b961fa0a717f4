use crate::issue::{Issue, IssueCategory};
use crate::notebook::Cell;
use crate::rules::heading_utils::HeadingOutline;
use crate::utils::html::HtmlParseError;
use dyn_clone::DynClone;

/// Error raised by a single rule on a single cell. The orchestrator logs it
/// and treats the cell as having no issues for that rule.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("could not parse cell markup: {0}")]
    Html(#[from] HtmlParseError),

    #[error("{rule}: {message}")]
    Rule { rule: &'static str, message: String },
}

pub type ScanResult = Result<Vec<Issue>, ScanError>;

/// Whether a rule looks at cells one by one or at the document outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Content checks, re-run only for cells that changed
    Cell,
    /// Outline checks, re-run over the whole document on every change
    Document,
}

pub trait Rule: DynClone + Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Categories this rule reports into
    fn categories(&self) -> &'static [IssueCategory];

    fn scope(&self) -> RuleScope {
        RuleScope::Cell
    }

    fn check_cell(&self, _cell: &Cell) -> ScanResult {
        Ok(Vec::new())
    }

    fn check_document(&self, _outline: &HeadingOutline) -> ScanResult {
        Ok(Vec::new())
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized;
}

dyn_clone::clone_trait_object!(Rule);
