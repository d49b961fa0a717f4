use crate::issue::{Issue, IssueCategory};
use crate::notebook::{Cell, CellKind};
use crate::rule::{Rule, ScanResult};
use crate::rules::alt_text_utils::{html_image_sources, markdown_image_sources};
use crate::utils::html::{HtmlParser, TagScanner};
use std::sync::Arc;

/// Scores an image referenced by a cell.
///
/// `src` is whatever the cell wrote: a path, a URL or a `data:` URI. `None`
/// means the image could not be scored and is not reported.
pub trait ImageAnalyzer: Send + Sync {
    /// Opacity on a 0 (fully transparent) to 10 (opaque) scale
    fn transparency(&self, src: &str) -> Option<f64>;

    /// Contrast ratio of text rendered inside the image
    fn text_contrast(&self, src: &str) -> Option<f64>;
}

/// Analyzer that never scores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullImageAnalyzer;

impl ImageAnalyzer for NullImageAnalyzer {
    fn transparency(&self, _src: &str) -> Option<f64> {
        None
    }

    fn text_contrast(&self, _src: &str) -> Option<f64> {
        None
    }
}

/// Image transparency and text-in-image contrast.
///
/// Classification against the thresholds is done here; the pixel work
/// belongs to the [`ImageAnalyzer`], which by default scores nothing.
#[derive(Clone)]
pub struct NB005ImageVisuals {
    analyzer: Arc<dyn ImageAnalyzer>,
    parser: Arc<dyn HtmlParser>,
    contrast_threshold: f64,
    transparency_threshold: f64,
}

impl Default for NB005ImageVisuals {
    fn default() -> Self {
        Self::new(Arc::new(NullImageAnalyzer), 4.5, 9.0)
    }
}

impl NB005ImageVisuals {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, contrast_threshold: f64, transparency_threshold: f64) -> Self {
        Self {
            analyzer,
            parser: Arc::new(TagScanner),
            contrast_threshold,
            transparency_threshold,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    fn image_sources(&self, cell: &Cell) -> Result<Vec<String>, crate::rule::ScanError> {
        let sources = match (cell.kind, cell.rendered_output_html.as_deref()) {
            (CellKind::Markdown, _) => {
                let mut sources: Vec<String> = markdown_image_sources(&cell.source)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                // Markdown images are still scored when the HTML half fails
                match self.parser.parse(&cell.source) {
                    Ok(fragment) => sources.extend(html_image_sources(&fragment).into_iter().map(str::to_string)),
                    Err(e) => log::warn!("{}: skipping HTML images of cell {}: {}", self.name(), cell.id, e),
                }
                sources
            }
            (CellKind::Code, Some(html)) => {
                let fragment = self.parser.parse(html)?;
                html_image_sources(&fragment).into_iter().map(str::to_string).collect()
            }
            (CellKind::Code, None) => Vec::new(),
        };
        Ok(sources)
    }
}

impl Rule for NB005ImageVisuals {
    fn name(&self) -> &'static str {
        "NB005"
    }

    fn description(&self) -> &'static str {
        "Images should be opaque and text inside them should have sufficient contrast"
    }

    fn categories(&self) -> &'static [IssueCategory] {
        &[IssueCategory::Contrast, IssueCategory::Transparency]
    }

    fn check_cell(&self, cell: &Cell) -> ScanResult {
        let mut issues = Vec::new();

        for src in self.image_sources(cell)? {
            if let Some(score) = self.analyzer.transparency(&src)
                && score < self.transparency_threshold
            {
                issues.push(Issue::high_transparency(cell.id.clone(), score));
            }
            if let Some(ratio) = self.analyzer.text_contrast(&src)
                && ratio < self.contrast_threshold
            {
                issues.push(Issue::low_contrast(cell.id.clone(), ratio));
            }
        }

        Ok(issues)
    }

    fn from_config(config: &crate::config::Config) -> Box<dyn Rule>
    where
        Self: Sized,
    {
        Box::new(Self::new(
            Arc::new(NullImageAnalyzer),
            config.visuals.contrast_threshold,
            config.visuals.transparency_threshold,
        ))
    }
}
