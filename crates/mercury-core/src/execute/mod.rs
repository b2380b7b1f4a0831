//! Code execution against a supervised kernel.

mod aggregator;
mod engine;
mod result;

pub use aggregator::{EventAggregator, Fold, HTML_PREVIEW_CHARS};
pub use engine::ExecutionEngine;
pub use result::{
    ExecutionFailure, ExecutionRequest, ExecutionResult, FailureKind, ImageOutput,
    NO_OUTPUT_PLACEHOLDER,
};
