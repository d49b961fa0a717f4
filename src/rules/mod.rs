pub mod alt_text_utils;
pub mod heading_utils;

mod nb001_heading_hierarchy;
mod nb002_missing_h1;
mod nb003_source_alt_text;
mod nb004_output_alt_text;
pub mod nb005_image_visuals;

pub use nb001_heading_hierarchy::{HierarchyViolation, NB001HeadingHierarchy, ViolationKind, validate_hierarchy};
pub use nb002_missing_h1::NB002MissingH1;
pub use nb003_source_alt_text::NB003SourceAltText;
pub use nb004_output_alt_text::NB004OutputAltText;
pub use nb005_image_visuals::{ImageAnalyzer, NB005ImageVisuals, NullImageAnalyzer};

use crate::config::GlobalConfig;
use crate::rule::Rule;
use std::collections::HashSet;

type RuleCtor = fn(&crate::config::Config) -> Box<dyn Rule>;

const RULES: &[(&str, RuleCtor)] = &[
    ("NB001", NB001HeadingHierarchy::from_config),
    ("NB002", NB002MissingH1::from_config),
    ("NB003", NB003SourceAltText::from_config),
    ("NB004", NB004OutputAltText::from_config),
    ("NB005", NB005ImageVisuals::from_config),
];

/// Returns all rule instances for config validation and CLI
pub fn all_rules(config: &crate::config::Config) -> Vec<Box<dyn Rule>> {
    RULES.iter().map(|(_, ctor)| ctor(config)).collect()
}

/// Names of every known rule, in registry order
pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(name, _)| *name)
}

pub fn filter_rules(rules: &[Box<dyn Rule>], global_config: &GlobalConfig) -> Vec<Box<dyn Rule>> {
    let disabled: HashSet<String> = global_config.disable.iter().map(|s| s.to_ascii_uppercase()).collect();
    let enabled: HashSet<String> = global_config.enable.iter().map(|s| s.to_ascii_uppercase()).collect();

    // `disable = ["all"]` leaves only what `enable` names
    if disabled.contains("ALL") {
        return rules
            .iter()
            .filter(|rule| enabled.contains(rule.name()))
            .map(|rule| dyn_clone::clone_box(&**rule))
            .collect();
    }

    rules
        .iter()
        .filter(|rule| enabled.is_empty() || enabled.contains(rule.name()))
        .filter(|rule| !disabled.contains(rule.name()))
        .map(|rule| dyn_clone::clone_box(&**rule))
        .collect()
}
