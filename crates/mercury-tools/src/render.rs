//! Rendering session results as content blocks.
//!
//! Block order for a successful execution:
//!
//! ```text
//! text output ─► uploaded artifacts ─► notebook upload ─► images
//! ```
//!
//! Failures render as one text block flagged `isError`.

use serde::Serialize;

use mercury_core::{
    ArtifactDescriptor, CreatedNotebook, ExecutionResult, Inspection, UploadOutcome,
};

use crate::error::ToolResult;
use crate::protocol::{ContentBlock, ToolResponse};

/// Render an execution result.
pub fn execution(result: &ExecutionResult) -> ToolResponse {
    if let Some(failure) = &result.failure {
        return match result.output.as_deref().filter(|o| !o.is_empty()) {
            Some(output) => ToolResponse::error(format!("{}\n\nOutput before failure:\n{}", failure.message, output)),
            None => ToolResponse::error(failure.message.clone()),
        };
    }

    let mut content = vec![ContentBlock::text(result.output.clone().unwrap_or_default())];

    if let Some(block) = artifacts_block(&result.artifacts) {
        content.push(block);
    }
    if let Some(warning) = &result.persistence_warning {
        content.push(ContentBlock::text(format!("\nWorkspace upload failed: {}", warning)));
    }

    content.extend(result.images.iter().map(|image| ContentBlock::Image {
        data: image.data.clone(),
        mime_type: image.mime_type.clone(),
    }));

    ToolResponse::success(content)
}

/// One text block listing uploaded files, `None` if there are none.
pub fn artifacts_block(artifacts: &[UploadOutcome]) -> Option<ContentBlock> {
    if artifacts.is_empty() {
        return None;
    }

    let mut lines = Vec::with_capacity(artifacts.len() * 2);
    for outcome in artifacts {
        match outcome {
            UploadOutcome::Uploaded(artifact) => {
                lines.push(format!("\n{}", artifact.relative_path));
                lines.push(download_line(artifact));
            }
            UploadOutcome::Failed { relative_path, error } => {
                lines.push(format!("\n{}: Error - {}", relative_path, error));
            }
        }
    }
    Some(ContentBlock::text(lines.join("\n")))
}

fn download_line(artifact: &ArtifactDescriptor) -> String {
    format!("Download ({}h): {}", artifact.expires_in_hours, artifact.access_url)
}

/// Render a created notebook: confirmation text, then the upload block.
pub fn created_notebook(created: &CreatedNotebook) -> ToolResponse {
    let mut content = vec![ContentBlock::text(format!(
        "Notebook created: {} ({} cells)",
        created.path.display(),
        created.cells
    ))];

    if let Some(artifact) = &created.upload {
        content.push(ContentBlock::text(format!("\nNotebook uploaded\n{}", download_line(artifact))));
    }
    if let Some(warning) = &created.upload_warning {
        content.push(ContentBlock::text(format!("\nNotebook upload failed: {}", warning)));
    }

    ToolResponse::success(content)
}

/// Render an introspection outcome.
pub fn inspection(inspection: Inspection) -> ToolResult<ToolResponse> {
    Ok(match inspection {
        Inspection::Value(value) => ToolResponse::text(serde_json::to_string_pretty(&value)?),
        Inspection::Text(text) => ToolResponse::text(text),
        Inspection::Failed(message) => ToolResponse::error(message),
    })
}

/// Render any serializable value as pretty JSON text.
pub fn json<T: Serialize>(value: &T) -> ToolResult<ToolResponse> {
    Ok(ToolResponse::text(serde_json::to_string_pretty(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use mercury_core::{FailureKind, ImageOutput};

    fn artifact(path: &str) -> ArtifactDescriptor {
        ArtifactDescriptor {
            relative_path: path.to_string(),
            local_path: PathBuf::from("/work").join(path),
            object_key: format!("prefix/s/{}", path),
            object_uri: format!("file://bucket/prefix/s/{}", path),
            access_url: format!("file:///objects/bucket/prefix/s/{}?signature=abc", path),
            expires_in_hours: 24,
            expires_at: 0,
            size_bytes: 1,
        }
    }

    #[test]
    fn test_success_block_order() {
        let mut result = ExecutionResult::succeeded(
            Some("hello".to_string()),
            vec![ImageOutput {
                data: "AAAA".to_string(),
                mime_type: "image/png".to_string(),
            }],
        );
        result.artifacts = vec![
            UploadOutcome::Uploaded(artifact("out.csv")),
            UploadOutcome::Failed {
                relative_path: "big.bin".to_string(),
                error: "disk full".to_string(),
            },
        ];

        let response = execution(&result);
        assert!(!response.is_error);
        assert_eq!(response.content.len(), 3);
        assert_eq!(response.first_text(), Some("hello"));
        assert_eq!(
            response.content[1].as_text(),
            Some(
                "\nout.csv\nDownload (24h): file:///objects/bucket/prefix/s/out.csv?signature=abc\n\nbig.bin: Error - disk full"
            )
        );
        assert!(matches!(&response.content[2], ContentBlock::Image { mime_type, .. } if mime_type == "image/png"));
    }

    #[test]
    fn test_no_artifacts_no_block() {
        let response = execution(&ExecutionResult::succeeded(None, Vec::new()));
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.first_text(), Some(mercury_core::NO_OUTPUT_PLACEHOLDER));
    }

    #[test]
    fn test_failure_is_single_error_block() {
        let result = ExecutionResult::failed(FailureKind::ExecutionTimeout, "Execution timeout after 1 seconds", None);
        let response = execution(&result);
        assert!(response.is_error);
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.first_text(), Some("Execution timeout after 1 seconds"));
    }

    #[test]
    fn test_failure_includes_partial_output() {
        let result = ExecutionResult::failed(
            FailureKind::InterpreterError,
            "ValueError: boom",
            Some("step 1".to_string()),
        );
        let response = execution(&result);
        assert!(response.is_error);
        assert_eq!(response.content.len(), 1);
        assert_eq!(
            response.first_text(),
            Some("ValueError: boom\n\nOutput before failure:\nstep 1")
        );
    }

    #[test]
    fn test_persistence_warning_is_rendered() {
        let mut result = ExecutionResult::succeeded(Some("ok".to_string()), Vec::new());
        result.persistence_warning = Some("store offline".to_string());
        let response = execution(&result);
        assert!(!response.is_error);
        assert_eq!(response.content[1].as_text(), Some("\nWorkspace upload failed: store offline"));
    }

    #[test]
    fn test_created_notebook_with_upload() {
        let created = CreatedNotebook {
            path: PathBuf::from("/work/report.ipynb"),
            cells: 2,
            upload: Some(artifact("report.ipynb")),
            upload_warning: None,
        };
        let response = created_notebook(&created);
        assert_eq!(response.first_text(), Some("Notebook created: /work/report.ipynb (2 cells)"));
        assert!(response.content[1].as_text().unwrap().starts_with("\nNotebook uploaded\nDownload (24h): "));
    }

    #[test]
    fn test_inspection_rendering() {
        let response = inspection(Inspection::Failed("name 'y' is not defined".to_string())).unwrap();
        assert!(response.is_error);

        let response = inspection(Inspection::Value(serde_json::json!({"type": "int"}))).unwrap();
        assert!(!response.is_error);
        assert!(response.first_text().unwrap().contains("\"type\": \"int\""));
    }
}
