use crate::issue::{Issue, IssueCategory};
use crate::notebook::{Cell, CellKind};
use crate::rule::{Rule, ScanResult};
use crate::rules::alt_text_utils::html_images_missing_alt;
use crate::utils::html::{HtmlParser, TagScanner};
use std::sync::Arc;

/// Images in a code cell's rendered output must carry alt text.
///
/// Plots and other bitmaps produced by running code are rendered without
/// alt text, so this is where most notebooks fail.
#[derive(Clone)]
pub struct NB004OutputAltText {
    parser: Arc<dyn HtmlParser>,
}

impl Default for NB004OutputAltText {
    fn default() -> Self {
        Self::new(Arc::new(TagScanner))
    }
}

impl NB004OutputAltText {
    pub fn new(parser: Arc<dyn HtmlParser>) -> Self {
        Self { parser }
    }
}

impl Rule for NB004OutputAltText {
    fn name(&self) -> &'static str {
        "NB004"
    }

    fn description(&self) -> &'static str {
        "Images in code cell output should have alternate text"
    }

    fn categories(&self) -> &'static [IssueCategory] {
        &[IssueCategory::AltText]
    }

    fn check_cell(&self, cell: &Cell) -> ScanResult {
        let (CellKind::Code, Some(html)) = (cell.kind, cell.rendered_output_html.as_deref()) else {
            return Ok(Vec::new());
        };

        let fragment = self.parser.parse(html)?;
        let missing = html_images_missing_alt(&fragment);

        Ok((0..missing).map(|_| Issue::missing_alt(cell.id.clone())).collect())
    }

    fn from_config(_config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_output_without_alt() {
        let cell = Cell::code(
            "plot",
            "plt.show()",
            Some("<img src=\"data:image/png;base64,AAAA\">".to_string()),
        );
        let issues = NB004OutputAltText::default().check_cell(&cell).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].cell_id.as_str(), "plot");
    }

    #[test]
    fn test_output_with_alt() {
        let cell = Cell::code(
            "plot",
            "display(img)",
            Some("<img src=\"a.png\" alt=\"Sales by month\">".to_string()),
        );
        assert!(NB004OutputAltText::default().check_cell(&cell).unwrap().is_empty());
    }

    #[test]
    fn test_unexecuted_code_cell() {
        let cell = Cell::code("c", "plt.show()", None);
        assert!(NB004OutputAltText::default().check_cell(&cell).unwrap().is_empty());
    }

    #[test]
    fn test_markdown_cells_are_skipped() {
        let mut cell = Cell::markdown("m", "text");
        cell.rendered_output_html = Some("<img src=\"x.png\">".to_string());
        assert!(NB004OutputAltText::default().check_cell(&cell).unwrap().is_empty());
    }

    #[test]
    fn test_source_images_are_not_output() {
        // An <img> in the code itself is not rendered
        let cell = Cell::code("c", "'<img src=\"x.png\">'", Some("<pre>ok</pre>".to_string()));
        assert!(NB004OutputAltText::default().check_cell(&cell).unwrap().is_empty());
    }
}
