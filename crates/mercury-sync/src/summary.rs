//! Compact summaries of notebook contents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::ipynb::{CellOutput, JupyterCell, JupyterNotebook};

/// Maximum characters of cell source included in a summary.
pub const SOURCE_PREVIEW_CHARS: usize = 500;

/// Maximum characters of output text included in a summary.
pub const OUTPUT_PREVIEW_CHARS: usize = 200;

/// Summary of a notebook file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookSummary {
    pub path: PathBuf,
    pub cell_count: usize,
    pub cells: Vec<CellSummary>,
}

/// Summary of one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSummary {
    pub index: usize,
    #[serde(rename = "type")]
    pub cell_type: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputSummary>>,
}

/// Summary of one code cell output. Display data is not summarised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputSummary {
    Stream { text: String },
    Result { data: String },
    Error { ename: String },
}

/// Return the longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let prefix = truncate_chars(text, max_chars);
    if prefix.len() < text.len() {
        format!("{}...", prefix)
    } else {
        prefix.to_string()
    }
}

impl NotebookSummary {
    /// Summarise an already parsed notebook.
    pub fn from_notebook(path: impl Into<PathBuf>, notebook: &JupyterNotebook) -> Self {
        let cells = notebook
            .cells
            .iter()
            .enumerate()
            .map(|(index, cell)| summarize_cell(index, cell))
            .collect();

        Self {
            path: path.into(),
            cell_count: notebook.cells.len(),
            cells,
        }
    }

    /// Read and summarise a notebook file.
    pub fn read(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let notebook = JupyterNotebook::read_from_file(path)?;
        Ok(Self::from_notebook(path, &notebook))
    }
}

fn summarize_cell(index: usize, cell: &JupyterCell) -> CellSummary {
    let outputs = cell.outputs().map(|outputs| {
        outputs
            .iter()
            .filter_map(|output| match output {
                CellOutput::Stream { text, .. } => Some(OutputSummary::Stream {
                    text: truncate_chars(&text.to_text(), OUTPUT_PREVIEW_CHARS).to_string(),
                }),
                CellOutput::ExecuteResult { data, .. } => {
                    let rendered = serde_json::Value::Object(data.clone()).to_string();
                    Some(OutputSummary::Result {
                        data: truncate_chars(&rendered, OUTPUT_PREVIEW_CHARS).to_string(),
                    })
                }
                CellOutput::Error { ename, .. } => Some(OutputSummary::Error {
                    ename: ename.clone(),
                }),
                CellOutput::DisplayData { .. } => None,
            })
            .collect()
    });

    CellSummary {
        index,
        cell_type: cell.cell_type().to_string(),
        source: preview(&cell.source_text(), SOURCE_PREVIEW_CHARS),
        outputs,
    }
}
