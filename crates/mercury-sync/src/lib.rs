//! Notebook support for Mercury sessions.
//!
//! Creates `.ipynb` files from cell specifications and reads them back
//! as compact summaries.
//!
//! # Architecture
//!
//! ```text
//! [{type, source}, ...] ─────► CellSpec ─────► NotebookBuilder ─────► notebook.ipynb
//!                                                                          │
//!                                                                          ▼
//!                                                                   NotebookSummary
//! ```

mod builder;
mod error;
mod ipynb;
mod summary;

pub use builder::{CellKind, CellSpec, NotebookBuilder, create_notebook, notebook_filename, parse_cell_specs};
pub use error::{SyncError, SyncResult};
pub use ipynb::{CellOutput, JupyterCell, JupyterMetadata, JupyterNotebook, KernelSpec, LanguageInfo, MimeData, MultilineString};
pub use summary::{
    CellSummary, NotebookSummary, OUTPUT_PREVIEW_CHARS, OutputSummary, SOURCE_PREVIEW_CHARS,
    truncate_chars,
};
