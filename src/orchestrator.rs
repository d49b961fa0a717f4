//! Full and incremental scan passes over one open document
//!
//! Both passes re-derive the heading outline of the whole document, because
//! hierarchy is a document-global property. Content rules run on every cell
//! in a full scan and only on the changed cell in an incremental scan. Each
//! cell's issue set is computed first and then written to the index in one
//! replace, and every pass ends with a reconciliation against the live cells.

use crate::category_index::CategoryIndex;
use crate::config::{Config, LabelDedup};
use crate::issue::{Issue, IssueCategory};
use crate::notebook::{Cell, CellId, NotebookHost};
use crate::rule::{Rule, RuleScope};
use crate::rules::heading_utils::HeadingOutline;
use crate::rules::{all_rules, filter_rules};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-call switches, passed explicitly into every scan entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// When false a pass clears the checked cells and detects nothing
    pub enabled: bool,
    /// The suggestion model is already loaded; no pull before the first request
    pub model_already_warmed: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_already_warmed: false,
        }
    }
}

/// Waits for the host document to settle before reconciliation
pub trait Settle {
    fn settle(&self);
}

/// Sleeps for a fixed delay; a zero delay returns immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct DelaySettle(pub Duration);

impl Settle for DelaySettle {
    fn settle(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Cells whose content rules ran
    pub cells_scanned: usize,
    /// Issues detected in this pass, before label dedup
    pub issues_detected: usize,
    /// Entries dropped by reconciliation
    pub reconciled: usize,
}

pub struct ScanOrchestrator {
    rules: Vec<Box<dyn Rule>>,
    index: CategoryIndex,
    settle: Box<dyn Settle>,
    /// Categories written by any active rule
    owned_categories: Vec<IssueCategory>,
    /// Categories written by document-scope rules
    document_categories: Vec<IssueCategory>,
}

impl ScanOrchestrator {
    pub fn new(rules: Vec<Box<dyn Rule>>, label_dedup: LabelDedup) -> Self {
        let categories_of = |scope: Option<RuleScope>| -> Vec<IssueCategory> {
            rules
                .iter()
                .filter(|rule| scope.is_none_or(|scope| rule.scope() == scope))
                .flat_map(|rule| rule.categories().iter().copied())
                .sorted()
                .dedup()
                .collect()
        };
        let owned_categories = categories_of(None);
        let document_categories = categories_of(Some(RuleScope::Document));

        Self {
            rules,
            index: CategoryIndex::new(label_dedup),
            settle: Box::new(DelaySettle::default()),
            owned_categories,
            document_categories,
        }
    }

    /// Active rules after `enable`/`disable`, dedup mode and reconcile delay from config
    pub fn from_config(config: &Config) -> Self {
        let rules = filter_rules(&all_rules(config), &config.global);
        Self::new(rules, config.global.label_dedup).with_settle(Box::new(DelaySettle(config.reconcile_delay())))
    }

    pub fn with_settle(mut self, settle: Box<dyn Settle>) -> Self {
        self.settle = settle;
        self
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn index(&self) -> &CategoryIndex {
        &self.index
    }

    /// The index, for writers outside the scan passes (suggestion entries)
    pub fn index_mut(&mut self) -> &mut CategoryIndex {
        &mut self.index
    }

    /// Start over for a newly opened document, then scan it fully
    pub fn open_document<H: NotebookHost + ?Sized>(&mut self, host: &H, scan: ScanConfig) -> ScanSummary {
        self.index = CategoryIndex::new(self.index.label_dedup());
        self.full_scan(host, scan)
    }

    pub fn full_scan<H: NotebookHost + ?Sized>(&mut self, host: &H, scan: ScanConfig) -> ScanSummary {
        let cells = host.cells();
        let mut summary = ScanSummary::default();

        if !scan.enabled {
            for cell in &cells {
                self.index.clear_cell(&cell.id);
            }
            summary.reconciled = self.reconcile(host);
            log::debug!("Checks disabled; cleared {} cells", cells.len());
            return summary;
        }

        let mut document_issues = self.document_issues(&cells);

        for cell in &cells {
            let mut issues = document_issues.remove(&cell.id).unwrap_or_default();
            issues.extend(self.cell_issues(cell));
            summary.cells_scanned += 1;
            summary.issues_detected += issues.len();
            self.index.replace_cell_issues(&cell.id, &self.owned_categories, issues);
        }

        summary.reconciled = self.reconcile(host);
        log::debug!(
            "Full scan: {} cells, {} issues detected, {} listed, {} reconciled",
            summary.cells_scanned,
            summary.issues_detected,
            self.index.len(),
            summary.reconciled
        );
        summary
    }

    /// Rescan after one cell's content changed
    pub fn cell_changed<H: NotebookHost + ?Sized>(&mut self, host: &H, changed: &CellId, scan: ScanConfig) -> ScanSummary {
        let mut summary = ScanSummary::default();

        if !scan.enabled {
            self.index.clear_cell(changed);
            summary.reconciled = self.reconcile(host);
            return summary;
        }

        let cells = host.cells();
        let mut document_issues = self.document_issues(&cells);

        for cell in &cells {
            let mut issues = document_issues.remove(&cell.id).unwrap_or_default();
            if &cell.id == changed {
                issues.extend(self.cell_issues(cell));
                summary.cells_scanned += 1;
                summary.issues_detected += issues.len();
                self.index.replace_cell_issues(&cell.id, &self.owned_categories, issues);
            } else {
                summary.issues_detected += issues.len();
                self.index.replace_cell_issues(&cell.id, &self.document_categories, issues);
            }
        }

        if summary.cells_scanned == 0 {
            log::debug!("Changed cell {changed} is no longer in the document");
        }

        summary.reconciled = self.reconcile(host);
        log::debug!(
            "Incremental scan of {}: {} issues detected, {} reconciled",
            changed,
            summary.issues_detected,
            summary.reconciled
        );
        summary
    }

    /// Every issue the active rules report for one cell, before label dedup.
    /// The index is not touched.
    pub fn issues_for_cell<H: NotebookHost + ?Sized>(&self, host: &H, cell_id: &CellId) -> Vec<Issue> {
        let cells = host.cells();
        let Some(cell) = cells.iter().find(|cell| &cell.id == cell_id) else {
            return Vec::new();
        };
        let mut issues = self.document_issues(&cells).remove(cell_id).unwrap_or_default();
        issues.extend(self.cell_issues(cell));
        issues
    }

    /// Outline issues for the whole document, grouped by owning cell
    fn document_issues(&self, cells: &[Cell]) -> HashMap<CellId, Vec<Issue>> {
        let outline = HeadingOutline::from_cells(cells);
        let mut by_cell: HashMap<CellId, Vec<Issue>> = HashMap::new();

        for rule in self.rules.iter().filter(|rule| rule.scope() == RuleScope::Document) {
            match rule.check_document(&outline) {
                Ok(issues) => {
                    for issue in issues {
                        by_cell.entry(issue.cell_id.clone()).or_default().push(issue);
                    }
                }
                Err(e) => log::warn!("Rule {} failed on the document outline: {}", rule.name(), e),
            }
        }

        by_cell
    }

    /// Content issues of one cell. A rule that fails on the cell contributes nothing.
    fn cell_issues(&self, cell: &Cell) -> Vec<Issue> {
        self.rules
            .iter()
            .filter(|rule| rule.scope() == RuleScope::Cell)
            .flat_map(|rule| match rule.check_cell(cell) {
                Ok(issues) => issues,
                Err(e) => {
                    log::warn!("Rule {} skipped cell {}: {}", rule.name(), cell.id, e);
                    Vec::new()
                }
            })
            .collect()
    }

    fn reconcile<H: NotebookHost + ?Sized>(&mut self, host: &H) -> usize {
        self.settle.settle();
        self.index.reconcile(&host.live_cell_ids())
    }
}
