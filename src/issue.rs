//! Accessibility issues and their categories

use crate::notebook::CellId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of issue classes, in the order sections are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    Header,
    AltText,
    Contrast,
    Transparency,
    AiSuggestion,
}

/// Explanatory material shown next to every issue of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryHelp {
    pub summary: &'static str,
    pub link_text: &'static str,
    pub link: &'static str,
}

const HEADING_HELP: CategoryHelp = CategoryHelp {
    summary: "Your header structure does not adhere to WCAG guidelines for page organization. \
              Properly structured headers are essential for communicating content hierarchy and \
              enabling assistive technologies, like screen readers, to navigate efficiently.",
    link_text: "WCAG headings guidelines",
    link: "https://www.w3.org/WAI/tutorials/page-structure/headings/",
};

const ALT_TEXT_HELP: CategoryHelp = CategoryHelp {
    summary: "Your images currently lack appropriate alternative text. Alternative text \
              communicates the purpose of images to users who cannot see them, such as those \
              using screen readers or when images fail to load.",
    link_text: "WCAG alt-text guidelines",
    link: "https://www.w3.org/TR/WCAG20-TECHS/H37.html",
};

const CONTRAST_HELP: CategoryHelp = CategoryHelp {
    summary: "Your text does not currently meet WCAG guidelines for color contrast. Proper \
              contrast keeps text readable for users with visual impairments or color \
              perception differences.",
    link_text: "WCAG text color contrast guidelines",
    link: "https://www.w3.org/WAI/WCAG21/Understanding/contrast-minimum.html",
};

const TRANSPARENCY_HELP: CategoryHelp = CategoryHelp {
    summary: "Your images do not currently meet WCAG guidelines for color transparency. Not all \
              users perceive colors in the same way, so heavily transparent images can become \
              unreadable.",
    link_text: "WCAG transparency guidelines",
    link: "https://www.w3.org/WAI/WCAG21/Understanding/use-of-color.html",
};

const AI_SUGGESTION_HELP: CategoryHelp = CategoryHelp {
    summary: "A language model proposed a rewrite of this cell. Review it before applying: \
              suggestions are generated and may be wrong.",
    link_text: "WCAG 2.1 overview",
    link: "https://www.w3.org/WAI/standards-guidelines/wcag/",
};

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Header,
        IssueCategory::AltText,
        IssueCategory::Contrast,
        IssueCategory::Transparency,
        IssueCategory::AiSuggestion,
    ];

    /// Categories produced by per-cell content rules
    pub const CONTENT: [IssueCategory; 3] =
        [IssueCategory::AltText, IssueCategory::Contrast, IssueCategory::Transparency];

    /// Section heading used by the rendering layer
    pub fn section_title(self) -> &'static str {
        match self {
            IssueCategory::Header => "Header Errors",
            IssueCategory::AltText => "Alt Text Errors",
            IssueCategory::Contrast => "Contrast Errors",
            IssueCategory::Transparency => "Transparency Errors",
            IssueCategory::AiSuggestion => "AI Suggestions",
        }
    }

    pub fn help(self) -> &'static CategoryHelp {
        match self {
            IssueCategory::Header => &HEADING_HELP,
            IssueCategory::AltText => &ALT_TEXT_HELP,
            IssueCategory::Contrast => &CONTRAST_HELP,
            IssueCategory::Transparency => &TRANSPARENCY_HELP,
            IssueCategory::AiSuggestion => &AI_SUGGESTION_HELP,
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueCategory::Header => "header",
            IssueCategory::AltText => "alt-text",
            IssueCategory::Contrast => "contrast",
            IssueCategory::Transparency => "transparency",
            IssueCategory::AiSuggestion => "ai-suggestion",
        };
        f.write_str(name)
    }
}

impl FromStr for IssueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "header" | "heading" | "headings" => Ok(IssueCategory::Header),
            "alt-text" | "alt" | "alttext" => Ok(IssueCategory::AltText),
            "contrast" => Ok(IssueCategory::Contrast),
            "transparency" => Ok(IssueCategory::Transparency),
            "ai-suggestion" | "ai" | "suggestion" => Ok(IssueCategory::AiSuggestion),
            _ => Err(format!("Unknown issue category: {s}")),
        }
    }
}

/// Category-specific measurement attached to an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SeverityData {
    /// A heading level jump: what was found and what the outline expected
    HeadingLevel { current: usize, expected: usize },
    /// Text-on-image contrast ratio
    ContrastRatio { ratio: f64 },
    /// Image opacity on a 0-10 scale
    Opacity { score: f64 },
}

/// One detected defect, owned by exactly one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub cell_id: CellId,
    /// Human-readable description that also discriminates duplicates
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<SeverityData>,
}

impl Issue {
    pub fn new(category: IssueCategory, cell_id: CellId, signature: impl Into<String>) -> Self {
        Self {
            category,
            cell_id,
            signature: signature.into(),
            severity: None,
        }
    }

    pub fn with_severity(mut self, severity: SeverityData) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn heading_level(cell_id: CellId, current: usize, expected: usize) -> Self {
        Issue::new(
            IssueCategory::Header,
            cell_id,
            format!("Heading format: expecting h{expected}, got h{current}"),
        )
        .with_severity(SeverityData::HeadingLevel { current, expected })
    }

    pub fn missing_h1(cell_id: CellId) -> Self {
        Issue::new(IssueCategory::Header, cell_id, "Header format: Missing h1 header")
    }

    pub fn missing_alt(cell_id: CellId) -> Self {
        Issue::new(IssueCategory::AltText, cell_id, "Cell Error: Missing Alt Tag")
    }

    pub fn low_contrast(cell_id: CellId, ratio: f64) -> Self {
        Issue::new(
            IssueCategory::Contrast,
            cell_id,
            format!("Cell Error: Text Contrast {ratio}"),
        )
        .with_severity(SeverityData::ContrastRatio { ratio })
    }

    pub fn high_transparency(cell_id: CellId, score: f64) -> Self {
        let percent = (10.0 - score) * 10.0;
        Issue::new(
            IssueCategory::Transparency,
            cell_id,
            format!("Image Err: High Image Transparency ({percent:.2}%)"),
        )
        .with_severity(SeverityData::Opacity { score })
    }

    /// Marker entry for a model-generated rewrite of the cell behind `issue`
    pub fn ai_suggestion(issue: &Issue) -> Self {
        Issue::new(
            IssueCategory::AiSuggestion,
            issue.cell_id.clone(),
            format!("AI Suggestion: {}", issue.signature),
        )
    }

    /// Short machine id used when asking a model about the issue
    pub fn rule_id(&self) -> &'static str {
        match (&self.category, &self.severity) {
            (IssueCategory::Header, Some(SeverityData::HeadingLevel { .. })) => "heading-order",
            (IssueCategory::Header, _) => "page-has-heading-one",
            (IssueCategory::AltText, _) => "image-alt",
            (IssueCategory::Contrast, _) => "color-contrast",
            (IssueCategory::Transparency, _) => "image-transparency",
            (IssueCategory::AiSuggestion, _) => "ai-suggestion",
        }
    }

    /// Longer description of what is wrong, for prompts and `explain`
    pub fn description(&self) -> String {
        match (&self.category, &self.severity) {
            (IssueCategory::Header, Some(SeverityData::HeadingLevel { current, expected })) => format!(
                "Heading levels should only increase by one; found an h{current} where an h{expected} was expected"
            ),
            (IssueCategory::Header, _) => "The notebook should contain a level-one heading".to_string(),
            (IssueCategory::AltText, _) => "Images must have alternate text".to_string(),
            (IssueCategory::Contrast, _) => {
                "Text in images must meet minimum color contrast ratio thresholds".to_string()
            }
            (IssueCategory::Transparency, _) => "Images should not rely on heavy transparency".to_string(),
            (IssueCategory::AiSuggestion, _) => self.signature.clone(),
        }
    }
}
