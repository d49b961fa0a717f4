//! Fixes applied back to the document
//!
//! Only one fix is deterministic: inserting a missing level-one heading.
//! Everything else goes through a model suggestion that the user accepts.

use crate::category_index::CategoryIndex;
use crate::issue::{Issue, IssueCategory};
use crate::notebook::{CellId, NotebookError, NotebookHost};
use crate::orchestrator::ScanConfig;
use crate::suggest::{Suggestion, SuggestionClient, SuggestionError, SuggestionRequest};

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    /// Rejected before the document was touched
    #[error("Invalid input: {0}")]
    InvalidUserInput(String),

    #[error(transparent)]
    Host(#[from] NotebookError),

    #[error(transparent)]
    Suggestion(#[from] SuggestionError),
}

/// Insert `# {title}` as a new first cell
pub fn insert_missing_h1<H: NotebookHost + ?Sized>(host: &mut H, title: &str) -> Result<CellId, FixError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FixError::InvalidUserInput("heading text must not be empty".to_string()));
    }
    if title.contains('\n') {
        return Err(FixError::InvalidUserInput("heading text must be a single line".to_string()));
    }

    let id = host.insert_markdown_cell(0, &format!("# {title}"))?;
    log::debug!("Inserted level-one heading cell {id}");
    Ok(id)
}

/// Ask the model for a rewrite of the cell behind `issue` and list it under
/// AI suggestions
pub fn request_suggestion<H, C>(
    host: &H,
    client: &mut C,
    index: &mut CategoryIndex,
    issue: &Issue,
    scan: ScanConfig,
) -> Result<Suggestion, FixError>
where
    H: NotebookHost + ?Sized,
    C: SuggestionClient + ?Sized,
{
    let cell = host
        .cells()
        .into_iter()
        .find(|cell| cell.id == issue.cell_id)
        .ok_or_else(|| NotebookError::UnknownCell(issue.cell_id.clone()))?;

    let request = SuggestionRequest::from_issue(&cell, issue);
    let suggestion = client.suggest(&request, scan)?;

    index.add(Issue::ai_suggestion(issue));
    Ok(suggestion)
}

/// Replace the cell's source with the suggestion verbatim and drop its
/// AI suggestion entry
pub fn apply_suggestion<H: NotebookHost + ?Sized>(
    host: &mut H,
    index: &mut CategoryIndex,
    issue: &Issue,
    suggestion: &Suggestion,
) -> Result<(), FixError> {
    host.set_cell_source(&issue.cell_id, &suggestion.replacement)?;
    let entry = Issue::ai_suggestion(issue);
    index.remove_issue(&entry.cell_id, &entry.signature, IssueCategory::AiSuggestion);
    Ok(())
}
