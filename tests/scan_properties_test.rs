use cellcheck_lib::config::{Config, LabelDedup};
use cellcheck_lib::rule::Rule;
use cellcheck_lib::utils::html::{HtmlFragment, HtmlParseError, HtmlParser, TagScanner};
use cellcheck_lib::rules::heading_utils::HeadingEntry;
use cellcheck_lib::rules::{NB003SourceAltText, NB004OutputAltText, ViolationKind, validate_hierarchy};
use cellcheck_lib::{Cell, CellId, CategoryIndex, IssueCategory, Notebook, NotebookHost, ScanConfig, ScanOrchestrator};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn notebook(cells: Vec<Cell>) -> Notebook {
    Notebook::from_cells(cells).unwrap()
}

/// Everything the rendering layer can observe, in a comparable form
fn snapshot(index: &CategoryIndex) -> (Vec<(IssueCategory, Vec<(String, String)>)>, Vec<String>) {
    let sections = index
        .enumerate()
        .into_iter()
        .map(|section| {
            let entries = section
                .entries
                .iter()
                .map(|e| (e.cell_id.to_string(), e.label.clone()))
                .collect();
            (section.category, entries)
        })
        .collect();
    let flagged = index.flagged_cells().into_iter().map(|id| id.to_string()).collect();
    (sections, flagged)
}

fn headings(levels: &[usize]) -> Vec<HeadingEntry> {
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| HeadingEntry {
            level,
            text: format!("H{i}"),
            cell_id: CellId::new(format!("c{i}")),
        })
        .collect()
}

#[test]
fn test_skip_from_two_to_four() {
    let violations = validate_hierarchy(&headings(&[1, 2, 4]));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].cell_id.as_str(), "c2");
    assert_eq!((violations[0].current, violations[0].expected), (4, 3));
    assert_eq!(violations[0].kind, ViolationKind::LevelSkip);
}

#[test]
fn test_skip_right_after_first_heading() {
    let violations = validate_hierarchy(&headings(&[1, 3, 2]));
    assert_eq!(violations[0].cell_id.as_str(), "c1");
    assert_eq!((violations[0].current, violations[0].expected), (3, 2));
    assert_eq!(violations[0].kind, ViolationKind::LevelSkip);
}

#[test]
fn test_missing_h1_on_first_markdown_cell() {
    let nb = notebook(vec![
        Cell::code("setup", "import pandas", None),
        Cell::markdown("first", "Intro text"),
        Cell::markdown("second", "## Data"),
    ]);
    let (orchestrator, _) = cellcheck_lib::audit(&nb, &Config::default());
    let headers = orchestrator.index().entries(IssueCategory::Header);
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].cell_id.as_str(), "first");
    assert_eq!(headers[0].label, "Header format: Missing h1 header");
}

#[test]
fn test_add_issue_twice() {
    let mut index = CategoryIndex::default();
    index.add_issue(CellId::from("cellA"), "Cell Error: Missing Alt Tag", IssueCategory::AltText);
    index.add_issue(CellId::from("cellA"), "Cell Error: Missing Alt Tag", IssueCategory::AltText);
    assert_eq!(index.len(), 1);
}

#[test]
fn test_reconcile_drops_dead_cells() {
    let mut index = CategoryIndex::new(LabelDedup::Cell);
    index.add_issue(CellId::from("cellA"), "Cell Error: Missing Alt Tag", IssueCategory::AltText);
    index.add_issue(CellId::from("cellB"), "Cell Error: Missing Alt Tag", IssueCategory::AltText);
    index.add_issue(CellId::from("cellB"), "Header format: Missing h1 header", IssueCategory::Header);

    let live: HashSet<CellId> = [CellId::from("cellA")].into_iter().collect();
    index.reconcile(&live);

    let remaining: Vec<_> = index
        .enumerate()
        .iter()
        .flat_map(|s| s.entries.iter().map(|e| e.cell_id.to_string()))
        .collect();
    assert_eq!(remaining, vec!["cellA".to_string()]);
}

#[test]
fn test_markdown_image_alt() {
    let nb = notebook(vec![
        Cell::markdown("title", "# Title"),
        Cell::markdown("empty", "![](foo.png)"),
        Cell::markdown("described", "![desc](foo.png)"),
    ]);
    let (orchestrator, _) = cellcheck_lib::audit(&nb, &Config::default());
    let index = orchestrator.index();
    assert!(index.has_issues(&CellId::from("empty")));
    assert!(!index.has_issues(&CellId::from("described")));
    assert_eq!(index.cell_categories(&CellId::from("empty")), vec![IssueCategory::AltText]);
}

#[test]
fn test_disabling_clears_every_cell() {
    let mut nb = notebook(vec![
        Cell::markdown("a", "### Deep"),
        Cell::markdown("b", "<img src=\"x.png\">"),
        Cell::code("c", "plot()", Some("<img src=\"data:image/png;base64,AA\">".to_string())),
    ]);
    let mut orchestrator = ScanOrchestrator::from_config(&Config::default());
    orchestrator.full_scan(&nb, ScanConfig::default());
    assert_eq!(orchestrator.index().flagged_cells().len(), 3);

    let disabled = ScanConfig {
        enabled: false,
        model_already_warmed: false,
    };
    orchestrator.full_scan(&nb, disabled);
    assert!(orchestrator.index().is_empty());
    assert!(orchestrator.index().flagged_cells().is_empty());

    // Edits while disabled detect nothing either
    nb.set_cell_source(&CellId::from("b"), "![](y.png)").unwrap();
    orchestrator.cell_changed(&nb, &CellId::from("b"), disabled);
    assert!(orchestrator.index().is_empty());
}

/// Scans normally, except that any fragment mentioning "corrupt" fails
struct FailsOnCorrupt;

impl HtmlParser for FailsOnCorrupt {
    fn parse(&self, html: &str) -> Result<HtmlFragment, HtmlParseError> {
        if html.contains("corrupt") {
            return Err(HtmlParseError::UnterminatedTag {
                tag: "img".to_string(),
                offset: 0,
            });
        }
        TagScanner.parse(html)
    }
}

#[test]
fn test_failing_cell_does_not_abort_scan() {
    let parser: Arc<dyn HtmlParser> = Arc::new(FailsOnCorrupt);
    let rules: Vec<Box<dyn Rule>> = vec![
        Box::new(NB003SourceAltText::new(parser.clone())),
        Box::new(NB004OutputAltText::new(parser)),
    ];
    let nb = notebook(vec![
        Cell::markdown("title", "# Title"),
        Cell::code("broken", "plot()", Some("<img src=\"a.png\"><!-- corrupt -->".to_string())),
        Cell::code("fine", "plot()", Some("<img src=\"b.png\">".to_string())),
        Cell::markdown("notes", "corrupt <img src=\"c.png\">\n\n![](d.png)"),
    ]);

    let mut orchestrator = ScanOrchestrator::new(rules, LabelDedup::Cell);
    let summary = orchestrator.full_scan(&nb, ScanConfig::default());
    assert_eq!(summary.cells_scanned, 4);

    let index = orchestrator.index();
    assert!(!index.has_issues(&CellId::from("broken")));
    assert!(index.has_issues(&CellId::from("fine")));
    // The markdown half of the source check survives the HTML failure
    let notes: Vec<_> = index
        .entries(IssueCategory::AltText)
        .iter()
        .filter(|e| e.cell_id.as_str() == "notes")
        .collect();
    assert_eq!(notes.len(), 1);
}

#[test]
fn test_prose_less_than_does_not_hide_images() {
    let nb = notebook(vec![
        Cell::markdown("title", "# Title"),
        Cell::markdown("loop", "Loop while i<n is true.\n\n![](plot.png)"),
        Cell::code(
            "out",
            "display(HTML(s))",
            Some("<p>if a <b then</p><script>x = '<img src=\"fake.png\">'</script><img src=\"real.png\">".to_string()),
        ),
    ]);
    let (orchestrator, _) = cellcheck_lib::audit(&nb, &Config::default());
    let index = orchestrator.index();
    assert!(index.has_issues(&CellId::from("loop")));
    assert!(index.has_issues(&CellId::from("out")));
}

#[test]
fn test_cell_dedup_lists_every_cell() {
    let mut config = Config::default();
    config.global.label_dedup = LabelDedup::Cell;
    let nb = notebook(vec![
        Cell::markdown("a", "# T\n![](x.png)"),
        Cell::markdown("b", "![](y.png)"),
    ]);
    let (orchestrator, _) = cellcheck_lib::audit(&nb, &config);
    let cells: Vec<_> = orchestrator
        .index()
        .entries(IssueCategory::AltText)
        .iter()
        .map(|e| e.cell_id.to_string())
        .collect();
    assert_eq!(cells, vec!["a", "b"]);
}

fn cell_strategy() -> impl Strategy<Value = (bool, usize, bool)> {
    // (is markdown, heading level or 0 for none, has an image without alt)
    (any::<bool>(), 0usize..=6, any::<bool>())
}

fn build_cells(layout: &[(bool, usize, bool)]) -> Vec<Cell> {
    layout.iter()
        .enumerate()
        .map(|(i, &(markdown, level, image))| {
            let id = format!("cell-{i}");
            let mut source = String::new();
            if level > 0 {
                source.push_str(&format!("{} Heading {i}\n", "#".repeat(level)));
            }
            if image {
                source.push_str("![](figure.png)\n");
            }
            if markdown {
                Cell::markdown(id, source)
            } else {
                let output = image.then(|| "<img src=\"data:image/png;base64,AA\">".to_string());
                Cell::code(id, source, output)
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_full_scan_is_idempotent(layout in prop::collection::vec(cell_strategy(), 0..12), cell_dedup in any::<bool>()) {
        let mut config = Config::default();
        config.global.label_dedup = if cell_dedup { LabelDedup::Cell } else { LabelDedup::Document };
        let nb = notebook(build_cells(&layout));

        let mut orchestrator = ScanOrchestrator::from_config(&config);
        orchestrator.full_scan(&nb, ScanConfig::default());
        let first = snapshot(orchestrator.index());
        orchestrator.full_scan(&nb, ScanConfig::default());
        let second = snapshot(orchestrator.index());

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_no_duplicate_entries_within_a_category(layout in prop::collection::vec(cell_strategy(), 0..12)) {
        let mut config = Config::default();
        config.global.label_dedup = LabelDedup::Cell;
        let nb = notebook(build_cells(&layout));
        let mut orchestrator = ScanOrchestrator::from_config(&config);
        orchestrator.full_scan(&nb, ScanConfig::default());
        for id in nb.live_cell_ids() {
            orchestrator.cell_changed(&nb, &id, ScanConfig::default());
        }

        for section in orchestrator.index().enumerate() {
            let keys: HashSet<_> = section.entries.iter().map(|e| (e.cell_id.clone(), e.label.clone())).collect();
            prop_assert_eq!(keys.len(), section.entries.len());
        }
    }

    #[test]
    fn prop_hierarchy_expected_levels(levels in prop::collection::vec(1usize..=6, 1..20)) {
        let violations = validate_hierarchy(&headings(&levels));
        for v in &violations {
            let idx: usize = v.cell_id.as_str()[1..].parse().unwrap();
            prop_assert!(idx > 0);
            match v.kind {
                ViolationKind::LevelSkip => prop_assert_eq!(v.expected, levels[idx - 1] + 1),
                ViolationKind::BelowMax => {
                    prop_assert_eq!(v.expected, *levels[..idx].iter().max().unwrap());
                    prop_assert!(v.current < v.expected);
                }
            }
        }
    }
}
