//! Jupyter notebook (.ipynb) model.
//!
//! Covers the subset of nbformat 4 that Mercury writes and reads back:
//! code, markdown and raw cells with their stream, result, display and
//! error outputs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// MIME type → payload map of a rich output.
pub type MimeData = serde_json::Map<String, serde_json::Value>;

/// A Jupyter notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterNotebook {
    /// Notebook metadata
    #[serde(default)]
    pub metadata: JupyterMetadata,

    /// Format version (always 4)
    pub nbformat: u32,

    /// Minor format version
    pub nbformat_minor: u32,

    /// Notebook cells
    #[serde(default)]
    pub cells: Vec<JupyterCell>,
}

/// Jupyter notebook metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterMetadata {
    /// Kernel specification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,

    /// Language info
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_info: Option<LanguageInfo>,

    /// Anything else written by other tools, kept for round-trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Kernel specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Display name
    pub display_name: String,

    /// Language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Kernel name
    pub name: String,
}

/// Language information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Language name
    pub name: String,

    /// File extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// Text stored either as one string or as a list of lines.
///
/// nbformat accepts both; Mercury writes the list form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultilineString {
    Single(String),
    Lines(Vec<String>),
}

impl MultilineString {
    /// Split text into lines, keeping each line's trailing newline.
    pub fn from_text(text: &str) -> Self {
        Self::Lines(text.split_inclusive('\n').map(String::from).collect())
    }

    /// Join back into a single string.
    pub fn to_text(&self) -> String {
        match self {
            Self::Single(text) => text.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

impl Default for MultilineString {
    fn default() -> Self {
        Self::Lines(Vec::new())
    }
}

/// A Jupyter cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum JupyterCell {
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: serde_json::Value,
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        outputs: Vec<CellOutput>,
        #[serde(default)]
        execution_count: Option<u32>,
    },
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: serde_json::Value,
        #[serde(default)]
        source: MultilineString,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: serde_json::Value,
        #[serde(default)]
        source: MultilineString,
    },
}

impl JupyterCell {
    /// Create an unexecuted code cell.
    pub fn code(id: impl Into<String>, source: &str) -> Self {
        Self::Code {
            id: Some(id.into()),
            metadata: serde_json::json!({}),
            source: MultilineString::from_text(source),
            outputs: Vec::new(),
            execution_count: None,
        }
    }

    /// Create a markdown cell.
    pub fn markdown(id: impl Into<String>, source: &str) -> Self {
        Self::Markdown {
            id: Some(id.into()),
            metadata: serde_json::json!({}),
            source: MultilineString::from_text(source),
        }
    }

    /// The nbformat cell type name.
    pub fn cell_type(&self) -> &'static str {
        match self {
            Self::Code { .. } => "code",
            Self::Markdown { .. } => "markdown",
            Self::Raw { .. } => "raw",
        }
    }

    /// The cell source as a single string.
    pub fn source_text(&self) -> String {
        match self {
            Self::Code { source, .. } | Self::Markdown { source, .. } | Self::Raw { source, .. } => {
                source.to_text()
            }
        }
    }

    /// Outputs of a code cell, `None` for other cell types.
    pub fn outputs(&self) -> Option<&[CellOutput]> {
        match self {
            Self::Code { outputs, .. } => Some(outputs),
            _ => None,
        }
    }
}

/// Cell output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type")]
pub enum CellOutput {
    /// Standard output/error
    #[serde(rename = "stream")]
    Stream { name: String, text: MultilineString },

    /// Value of the last expression
    #[serde(rename = "execute_result")]
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: MimeData,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Display data
    #[serde(rename = "display_data")]
    DisplayData {
        #[serde(default)]
        data: MimeData,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Error output
    #[serde(rename = "error")]
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl JupyterNotebook {
    /// Create a new empty notebook for a Python kernel.
    pub fn new() -> Self {
        Self {
            metadata: JupyterMetadata::default(),
            nbformat: 4,
            nbformat_minor: 5,
            cells: Vec::new(),
        }
    }

    /// Write the notebook to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| SyncError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!("Wrote notebook {} ({} cells)", path.display(), self.cells.len());
        Ok(())
    }

    /// Read a notebook from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::NotFound(path.display().to_string())
            } else {
                SyncError::ReadError {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;
        let notebook: Self = serde_json::from_str(&content)?;
        if notebook.nbformat != 4 {
            return Err(SyncError::InvalidNotebook(format!(
                "unsupported nbformat version {}",
                notebook.nbformat
            )));
        }
        Ok(notebook)
    }
}

impl Default for JupyterNotebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for JupyterMetadata {
    fn default() -> Self {
        Self {
            kernelspec: Some(KernelSpec {
                display_name: "Python 3".to_string(),
                language: Some("python".to_string()),
                name: "python3".to_string(),
            }),
            language_info: Some(LanguageInfo {
                name: "python".to_string(),
                file_extension: Some(".py".to_string()),
                mimetype: Some("text/x-python".to_string()),
            }),
            extra: serde_json::Map::new(),
        }
    }
}
