pub mod category_index;
pub mod config;
pub mod exit_codes;
pub mod fixes;
pub mod issue;
pub mod notebook;
pub mod orchestrator;
pub mod rule;
pub mod rules;
pub mod suggest;
pub mod utils;

pub use category_index::{CategoryIndex, IssueRecord, SectionHandle, SectionView};
pub use issue::{Issue, IssueCategory, SeverityData};
pub use notebook::{Cell, CellId, CellKind, Notebook, NotebookError, NotebookHost};
pub use orchestrator::{ScanConfig, ScanOrchestrator, ScanSummary};
pub use rules::*;

use crate::config::Config;

/// Scan a document once with the rules and settings of `config`.
///
/// The returned orchestrator holds the populated index and can keep
/// tracking the document through [`ScanOrchestrator::cell_changed`].
pub fn audit<H: NotebookHost + ?Sized>(host: &H, config: &Config) -> (ScanOrchestrator, ScanSummary) {
    let mut orchestrator = ScanOrchestrator::from_config(config);
    let summary = orchestrator.open_document(host, config.scan_config());
    (orchestrator, summary)
}
