use crate::issue::{Issue, IssueCategory};
use crate::notebook::Cell;
use crate::rule::{Rule, ScanResult};
use crate::rules::alt_text_utils::{html_images_missing_alt, markdown_images_missing_alt};
use crate::utils::html::{HtmlParser, TagScanner};
use std::sync::Arc;

/// Images written in a markdown cell must carry alt text.
///
/// The source is read twice: as HTML for `<img>` tags and as markdown for
/// `![](...)`. Every offending image yields an issue; identical issues for
/// the same cell are collapsed by the index. A parser failure only loses the
/// HTML half; the markdown check always runs.
#[derive(Clone)]
pub struct NB003SourceAltText {
    parser: Arc<dyn HtmlParser>,
}

impl Default for NB003SourceAltText {
    fn default() -> Self {
        Self::new(Arc::new(TagScanner))
    }
}

impl NB003SourceAltText {
    pub fn new(parser: Arc<dyn HtmlParser>) -> Self {
        Self { parser }
    }
}

impl Rule for NB003SourceAltText {
    fn name(&self) -> &'static str {
        "NB003"
    }

    fn description(&self) -> &'static str {
        "Images in markdown cells should have alternate text"
    }

    fn categories(&self) -> &'static [IssueCategory] {
        &[IssueCategory::AltText]
    }

    fn check_cell(&self, cell: &Cell) -> ScanResult {
        if !cell.is_markdown() {
            return Ok(Vec::new());
        }

        let html_missing = match self.parser.parse(&cell.source) {
            Ok(fragment) => html_images_missing_alt(&fragment),
            Err(e) => {
                log::warn!("{}: skipping HTML images of cell {}: {}", self.name(), cell.id, e);
                0
            }
        };
        let missing = html_missing + markdown_images_missing_alt(&cell.source);

        Ok((0..missing).map(|_| Issue::missing_alt(cell.id.clone())).collect())
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(Self::default())
    }
}
