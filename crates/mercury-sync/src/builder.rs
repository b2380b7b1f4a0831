//! Notebook construction from loosely-typed cell specifications.
//!
//! Callers send cells as `{"type": "code"|"markdown", "source": "..."}`
//! objects, but clients regularly double-encode them as JSON strings or
//! send bare source strings. All three forms are accepted here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::ipynb::{JupyterCell, JupyterNotebook};

/// Kind of cell requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Code,
    Markdown,
}

/// One requested cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpec {
    /// Cell kind; anything other than `markdown` becomes a code cell.
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: CellKind,
    /// Cell source.
    #[serde(default)]
    pub source: String,
}

impl CellSpec {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markdown,
            source: source.into(),
        }
    }

    /// Interpret a single cell value.
    ///
    /// A string that parses as a JSON object is treated as that object;
    /// any other string becomes a code cell with the string as source.
    pub fn from_value(value: &Value) -> SyncResult<Self> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value.clone())?),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(inner @ Value::Object(_)) => Ok(serde_json::from_value(inner)?),
                _ => Ok(Self::code(text.clone())),
            },
            other => Err(SyncError::InvalidCells(format!(
                "expected cell object or string, got {}",
                json_type_name(other)
            ))),
        }
    }
}

fn lenient_kind<'de, D>(deserializer: D) -> Result<CellKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let kind = Option::<String>::deserialize(deserializer)?;
    Ok(match kind.as_deref() {
        Some("markdown") => CellKind::Markdown,
        _ => CellKind::Code,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Interpret the `cells` argument of a notebook creation request.
///
/// Accepts an array, or a string holding a JSON-encoded array.
pub fn parse_cell_specs(cells: &Value) -> SyncResult<Vec<CellSpec>> {
    let decoded;
    let cells = match cells {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text)
                .map_err(|_| SyncError::InvalidCells("expected array".to_string()))?;
            &decoded
        }
        other => other,
    };

    let Value::Array(items) = cells else {
        return Err(SyncError::InvalidCells("expected array".to_string()));
    };

    items.iter().map(CellSpec::from_value).collect()
}

/// Ensure a notebook filename carries the `.ipynb` extension.
pub fn notebook_filename(filename: &str) -> String {
    if filename.ends_with(".ipynb") {
        filename.to_string()
    } else {
        format!("{}.ipynb", filename)
    }
}

/// Builds notebooks from cell specifications.
pub struct NotebookBuilder {
    notebook: JupyterNotebook,
}

impl NotebookBuilder {
    pub fn new() -> Self {
        Self {
            notebook: JupyterNotebook::new(),
        }
    }

    /// Append one cell.
    pub fn push(&mut self, spec: &CellSpec) -> &mut Self {
        let id = format!("cell-{}", self.notebook.cells.len());
        let cell = match spec.kind {
            CellKind::Markdown => JupyterCell::markdown(id, &spec.source),
            CellKind::Code => JupyterCell::code(id, &spec.source),
        };
        self.notebook.cells.push(cell);
        self
    }

    /// Append several cells.
    pub fn extend<'a>(&mut self, specs: impl IntoIterator<Item = &'a CellSpec>) -> &mut Self {
        for spec in specs {
            self.push(spec);
        }
        self
    }

    pub fn build(self) -> JupyterNotebook {
        self.notebook
    }
}

impl Default for NotebookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a notebook file named `filename` inside `dir`.
///
/// Returns the path that was written.
pub fn create_notebook(dir: impl AsRef<Path>, filename: &str, cells: &[CellSpec]) -> SyncResult<PathBuf> {
    let path = dir.as_ref().join(notebook_filename(filename));

    let mut builder = NotebookBuilder::new();
    builder.extend(cells);
    builder.build().write_to_file(&path)?;

    tracing::info!("Created notebook {} ({} cells)", path.display(), cells.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object_cells() {
        let specs = parse_cell_specs(&json!([
            {"type": "markdown", "source": "# Title"},
            {"type": "code", "source": "x = 1"}
        ]))
        .unwrap();

        assert_eq!(specs, vec![CellSpec::markdown("# Title"), CellSpec::code("x = 1")]);
    }

    #[test]
    fn test_parse_double_encoded_cells() {
        let encoded = json!([{"type": "markdown", "source": "hi"}]).to_string();
        let specs = parse_cell_specs(&Value::String(encoded)).unwrap();
        assert_eq!(specs, vec![CellSpec::markdown("hi")]);
    }

    #[test]
    fn test_parse_string_cells() {
        let specs = parse_cell_specs(&json!([
            r#"{"type": "markdown", "source": "notes"}"#,
            "print('raw')"
        ]))
        .unwrap();

        assert_eq!(specs[0], CellSpec::markdown("notes"));
        assert_eq!(specs[1], CellSpec::code("print('raw')"));
    }

    #[test]
    fn test_unknown_kind_becomes_code() {
        let spec = CellSpec::from_value(&json!({"type": "raw", "source": "x"})).unwrap();
        assert_eq!(spec.kind, CellKind::Code);
    }

    #[test]
    fn test_invalid_cells() {
        assert!(parse_cell_specs(&Value::String("not json".into())).is_err());
        assert!(parse_cell_specs(&json!({"type": "code"})).is_err());
        assert!(parse_cell_specs(&json!([42])).is_err());
    }

    #[test]
    fn test_notebook_filename() {
        assert_eq!(notebook_filename("analysis"), "analysis.ipynb");
        assert_eq!(notebook_filename("analysis.ipynb"), "analysis.ipynb");
    }

    #[test]
    fn test_builder_assigns_unique_ids() {
        let mut builder = NotebookBuilder::new();
        builder.extend(&[CellSpec::code("a"), CellSpec::code("b")]);
        let notebook = builder.build();

        let ids: Vec<_> = notebook
            .cells
            .iter()
            .map(|cell| match cell {
                JupyterCell::Code { id, .. } => id.clone().unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec!["cell-0", "cell-1"]);
    }
}
