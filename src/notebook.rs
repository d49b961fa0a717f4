//! Notebook document model
//!
//! The checker only ever sees a snapshot of the live document: an ordered
//! list of [`Cell`]s with stable ids. [`NotebookHost`] is the seam to whatever
//! owns the real document (an editor, or the in-memory [`Notebook`] loaded
//! from an `.ipynb` file by the CLI).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Opaque cell identifier, unique within a document and never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Markdown => write!(f, "markdown"),
            CellKind::Code => write!(f, "code"),
        }
    }
}

/// Snapshot of one cell taken for a scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub source: String,
    /// Serialized execution output; only code cells that have run carry one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_output_html: Option<String>,
}

impl Cell {
    pub fn markdown(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: CellId::new(id),
            kind: CellKind::Markdown,
            source: source.into(),
            rendered_output_html: None,
        }
    }

    pub fn code(id: impl Into<String>, source: impl Into<String>, output_html: Option<String>) -> Self {
        Self {
            id: CellId::new(id),
            kind: CellKind::Code,
            source: source.into(),
            rendered_output_html: output_html,
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.kind == CellKind::Markdown
    }
}

/// Errors raised while loading, saving or mutating a notebook
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Failed to read notebook at {path}: {source}")]
    Io { source: io::Error, path: String },

    #[error("Invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported notebook structure: {0}")]
    Unsupported(String),

    #[error("No cell with id '{0}' in the notebook")]
    UnknownCell(CellId),
}

/// What the checker needs from the document that owns the cells
pub trait NotebookHost {
    /// Live cells in document order
    fn cells(&self) -> Vec<Cell>;

    /// Insert a new markdown cell, returning its id
    fn insert_markdown_cell(&mut self, position: usize, source: &str) -> Result<CellId, NotebookError>;

    /// Replace a cell's raw source verbatim
    fn set_cell_source(&mut self, id: &CellId, source: &str) -> Result<(), NotebookError>;

    /// Ids of every live cell
    fn live_cell_ids(&self) -> HashSet<CellId> {
        self.cells().into_iter().map(|cell| cell.id).collect()
    }
}

/// An nbformat 4 notebook held in memory
///
/// The original JSON is kept so that saving preserves metadata and outputs
/// the checker never looks at.
#[derive(Debug, Clone)]
pub struct Notebook {
    raw: Value,
    cells: Vec<Cell>,
    issued_ids: HashSet<CellId>,
    generated: u64,
    path: Option<PathBuf>,
}

impl Notebook {
    pub fn from_json_str(content: &str) -> Result<Self, NotebookError> {
        let raw: Value = serde_json::from_str(content)?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> Result<Self, NotebookError> {
        let raw_cells = raw
            .get("cells")
            .and_then(Value::as_array)
            .ok_or_else(|| NotebookError::Unsupported("missing 'cells' array".to_string()))?;

        let mut cells = Vec::with_capacity(raw_cells.len());
        let mut issued_ids = HashSet::new();
        for (idx, raw_cell) in raw_cells.iter().enumerate() {
            let cell = parse_cell(idx, raw_cell)?;
            if !issued_ids.insert(cell.id.clone()) {
                return Err(NotebookError::Unsupported(format!("duplicate cell id '{}'", cell.id)));
            }
            cells.push(cell);
        }

        log::debug!("Loaded notebook with {} cells", cells.len());

        Ok(Self {
            raw,
            cells,
            issued_ids,
            generated: 0,
            path: None,
        })
    }

    /// Build an nbformat 4 notebook around already-parsed cells
    pub fn from_cells(cells: Vec<Cell>) -> Result<Self, NotebookError> {
        let raw_cells: Vec<Value> = cells.iter().map(cell_to_value).collect();
        let raw = serde_json::json!({
            "cells": raw_cells,
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5,
        });
        let mut notebook = Self::from_value(raw)?;
        // Keep rendered output the JSON form cannot carry
        notebook.cells = cells;
        Ok(notebook)
    }

    pub fn load(path: &Path) -> Result<Self, NotebookError> {
        let content = fs::read_to_string(path).map_err(|source| NotebookError::Io {
            source,
            path: path.display().to_string(),
        })?;
        let mut notebook = Self::from_json_str(&content)?;
        notebook.path = Some(path.to_path_buf());
        Ok(notebook)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn to_json_string(&self) -> Result<String, NotebookError> {
        let mut out = serde_json::to_string_pretty(&self.raw)?;
        out.push('\n');
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> Result<(), NotebookError> {
        let content = self.to_json_string()?;
        fs::write(path, content).map_err(|source| NotebookError::Io {
            source,
            path: path.display().to_string(),
        })
    }

    pub fn get(&self, id: &CellId) -> Option<&Cell> {
        self.cells.iter().find(|cell| &cell.id == id)
    }

    /// Delete a cell. Its id stays issued and is never handed out again.
    pub fn remove_cell(&mut self, id: &CellId) -> Result<Cell, NotebookError> {
        let idx = self
            .cells
            .iter()
            .position(|cell| &cell.id == id)
            .ok_or_else(|| NotebookError::UnknownCell(id.clone()))?;
        let raw_cells = self.raw_cells_mut()?;
        if idx < raw_cells.len() {
            raw_cells.remove(idx);
        }
        Ok(self.cells.remove(idx))
    }

    fn next_cell_id(&mut self) -> CellId {
        loop {
            self.generated += 1;
            let candidate = CellId::new(format!("cellcheck-{}", self.generated));
            if self.issued_ids.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Cell ids are part of the format from nbformat 4.5 on; older files
    /// must not carry them
    fn stores_cell_ids(&self) -> bool {
        let major = self.raw.get("nbformat").and_then(Value::as_u64).unwrap_or(4);
        let minor = self.raw.get("nbformat_minor").and_then(Value::as_u64).unwrap_or(0);
        major > 4 || (major == 4 && minor >= 5)
    }

    fn raw_cells_mut(&mut self) -> Result<&mut Vec<Value>, NotebookError> {
        self.raw
            .get_mut("cells")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| NotebookError::Unsupported("missing 'cells' array".to_string()))
    }
}

impl NotebookHost for Notebook {
    fn cells(&self) -> Vec<Cell> {
        self.cells.clone()
    }

    fn insert_markdown_cell(&mut self, position: usize, source: &str) -> Result<CellId, NotebookError> {
        let id = self.next_cell_id();
        let position = position.min(self.cells.len());

        let mut raw_cell = Map::new();
        raw_cell.insert("cell_type".to_string(), Value::from("markdown"));
        if self.stores_cell_ids() {
            raw_cell.insert("id".to_string(), Value::from(id.as_str()));
        }
        raw_cell.insert("metadata".to_string(), Value::Object(Map::new()));
        raw_cell.insert("source".to_string(), Value::from(source));
        self.raw_cells_mut()?.insert(position, Value::Object(raw_cell));

        self.cells.insert(position, Cell::markdown(id.as_str(), source));
        Ok(id)
    }

    fn set_cell_source(&mut self, id: &CellId, source: &str) -> Result<(), NotebookError> {
        let idx = self
            .cells
            .iter()
            .position(|cell| &cell.id == id)
            .ok_or_else(|| NotebookError::UnknownCell(id.clone()))?;

        let raw_cell = self
            .raw_cells_mut()?
            .get_mut(idx)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| NotebookError::Unsupported(format!("cell {idx} is not an object")))?;
        raw_cell.insert("source".to_string(), Value::from(source));

        self.cells[idx].source = source.to_string();
        Ok(())
    }
}

fn parse_cell(idx: usize, raw_cell: &Value) -> Result<Cell, NotebookError> {
    let cell_type = raw_cell
        .get("cell_type")
        .and_then(Value::as_str)
        .ok_or_else(|| NotebookError::Unsupported(format!("cell {idx} has no cell_type")))?;

    // nbformat < 4.5 has no cell ids
    let id = raw_cell
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("cell-{idx}"));

    let source = raw_cell.get("source").map(join_multiline).unwrap_or_default();

    let cell = match cell_type {
        "markdown" => Cell::markdown(id, source),
        "code" => {
            let outputs = raw_cell.get("outputs").and_then(Value::as_array);
            let html = outputs.and_then(|outputs| render_outputs(outputs));
            Cell::code(id, source, html)
        }
        // Raw cells are never rendered, so nothing in them reaches a reader
        "raw" => Cell::code(id, source, None),
        other => {
            return Err(NotebookError::Unsupported(format!(
                "cell {idx} has unknown cell_type '{other}'"
            )));
        }
    };

    Ok(cell)
}

fn cell_to_value(cell: &Cell) -> Value {
    match cell.kind {
        CellKind::Markdown => serde_json::json!({
            "cell_type": "markdown",
            "id": cell.id.as_str(),
            "metadata": {},
            "source": cell.source,
        }),
        CellKind::Code => serde_json::json!({
            "cell_type": "code",
            "id": cell.id.as_str(),
            "metadata": {},
            "execution_count": null,
            "outputs": [],
            "source": cell.source,
        }),
    }
}

/// nbformat stores text either as a string or as a list of lines
fn join_multiline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Build the HTML a notebook frontend would show for a code cell's outputs
fn render_outputs(outputs: &[Value]) -> Option<String> {
    let mut html = String::new();

    for output in outputs {
        let output_type = output.get("output_type").and_then(Value::as_str).unwrap_or_default();
        match output_type {
            "stream" => {
                let text = output.get("text").map(join_multiline).unwrap_or_default();
                html.push_str(&format!("<pre>{}</pre>", escape_html(&text)));
            }
            "execute_result" | "display_data" => {
                if let Some(data) = output.get("data").and_then(Value::as_object) {
                    render_mime_bundle(data, &mut html);
                }
            }
            "error" => {
                let name = output.get("ename").and_then(Value::as_str).unwrap_or_default();
                let value = output.get("evalue").and_then(Value::as_str).unwrap_or_default();
                html.push_str(&format!("<pre>{}: {}</pre>", escape_html(name), escape_html(value)));
            }
            _ => {}
        }
    }

    if html.is_empty() { None } else { Some(html) }
}

fn render_mime_bundle(data: &Map<String, Value>, html: &mut String) {
    // Richest representation wins, like the frontend
    if let Some(markup) = data.get("text/html") {
        html.push_str(&join_multiline(markup));
    } else if let Some(svg) = data.get("image/svg+xml") {
        html.push_str(&join_multiline(svg));
    } else if let Some((mime, payload)) = data.iter().find(|(mime, _)| mime.starts_with("image/")) {
        let payload = join_multiline(payload);
        html.push_str(&format!("<img src=\"data:{mime};base64,{}\">", payload.trim()));
    } else if let Some(text) = data.get("text/plain") {
        html.push_str(&format!("<pre>{}</pre>", escape_html(&join_multiline(text))));
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
