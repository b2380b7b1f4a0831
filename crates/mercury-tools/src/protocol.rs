//! Tool call and response messages.
//!
//! Defines the records exchanged with a tool-calling client: the list of
//! tool definitions, incoming calls, and content-block responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ToolError, ToolResult};

/// A tool offered to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// Definitions of every tool the router dispatches.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "execute_code",
            description: "Execute Python code in the session kernel and return its output. \
                          Supports rich outputs like plots and dataframes.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Python code to execute"},
                    "timeout": {
                        "type": "number",
                        "description": "Execution timeout in seconds (default: 60)",
                        "default": 60
                    }
                },
                "required": ["code"]
            }),
        },
        ToolDefinition {
            name: "get_kernel_status",
            description: "Get the current status of the kernel",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "restart_kernel",
            description: "Restart the kernel to clear all state",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "get_variables",
            description: "List the variables defined in the kernel namespace",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "inspect_variable",
            description: "Get detailed information about a variable including its type, \
                          value and shape (for arrays and dataframes)",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Name of the variable to inspect"}
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "install_package",
            description: "Install a Python package using pip",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "package": {
                        "type": "string",
                        "description": "Package to install, optionally with a version specifier, e.g. 'pandas>=2.0'"
                    }
                },
                "required": ["package"]
            }),
        },
        ToolDefinition {
            name: "create_notebook",
            description: "Create a new Jupyter notebook with the given cells",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "Filename for the notebook (.ipynb is appended if missing)"
                    },
                    "cells": {
                        "type": "array",
                        "description": "Cells with 'type' (code/markdown) and 'source'",
                        "items": {
                            "type": "object",
                            "properties": {
                                "type": {"type": "string", "enum": ["code", "markdown"]},
                                "source": {"type": "string"}
                            },
                            "required": ["type", "source"]
                        }
                    }
                },
                "required": ["filename", "cells"]
            }),
        },
        ToolDefinition {
            name: "read_notebook",
            description: "Read a Jupyter notebook and summarise its cells",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string", "description": "Path to the notebook file"}
                },
                "required": ["filename"]
            }),
        },
    ]
}

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments: match arguments {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// Decode `{name, arguments}` call parameters.
    ///
    /// Both the parameters and the arguments may arrive as JSON-encoded
    /// strings. Arguments that are not an object are treated as empty.
    pub fn from_params(params: &Value) -> ToolResult<Self> {
        let decoded;
        let params = match params {
            Value::String(text) => {
                decoded = serde_json::from_str::<Value>(text).map_err(|_| {
                    ToolError::InvalidParams("expected object, got string".to_string())
                })?;
                &decoded
            }
            other => other,
        };
        let Value::Object(params) = params else {
            return Err(ToolError::InvalidParams("expected object".to_string()));
        };

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParams("missing tool name".to_string()))?;

        let arguments = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(text)) => match serde_json::from_str(text) {
                Ok(Value::Object(map)) => map,
                _ => {
                    tracing::debug!("Ignoring undecodable arguments for {}", name);
                    Map::new()
                }
            },
            _ => Map::new(),
        };

        Ok(Self {
            name: name.to_string(),
            arguments,
        })
    }

    /// A required string argument.
    pub fn str_arg(&self, name: &'static str) -> ToolResult<&str> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Err(ToolError::MissingArgument(name)),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ToolError::InvalidArgument {
                name,
                message: "expected a string".to_string(),
            }),
        }
    }

    /// An optional number argument. Numeric strings are accepted.
    pub fn f64_arg(&self, name: &'static str) -> ToolResult<Option<f64>> {
        match self.arguments.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(text)) => text.trim().parse::<f64>().map(Some).map_err(|_| ToolError::InvalidArgument {
                name,
                message: format!("expected a number, got '{}'", text),
            }),
            Some(_) => Err(ToolError::InvalidArgument {
                name,
                message: "expected a number".to_string(),
            }),
        }
    }

    /// A required argument of any JSON type.
    pub fn value_arg(&self, name: &'static str) -> ToolResult<&Value> {
        self.arguments
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or(ToolError::MissingArgument(name))
    }
}

/// One block of a tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded image bytes.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Response to a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// A single-text-block success.
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![ContentBlock::text(text)])
    }

    /// A single-text-block failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// Text of the first block, if it is text.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(ContentBlock::as_text)
    }
}

impl From<ToolError> for ToolResponse {
    fn from(e: ToolError) -> Self {
        Self::error(e.to_string())
    }
}
