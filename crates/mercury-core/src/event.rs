//! Typed execution events.
//!
//! The interpreter reports everything it does during a request as records
//! of the form `{"msg_type": ..., "content": {...}}`. Records are decoded
//! into [`ExecutionEvent`] once, at the channel boundary; nothing past the
//! kernel transport looks at raw JSON.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Interpreter activity reported by `status` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelActivity {
    Starting,
    Busy,
    /// The interpreter finished the current submission.
    Idle,
}

/// MIME type → payload map carried by result and display events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimeBundle(BTreeMap<String, Value>);

impl MimeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text payload.
    pub fn with(mut self, mime: impl Into<String>, payload: impl Into<String>) -> Self {
        self.0.insert(mime.into(), Value::String(payload.into()));
        self
    }

    /// Text payload for a MIME type.
    ///
    /// Payloads split into a list of lines are joined back together.
    pub fn text(&self, mime: &str) -> Option<String> {
        match self.0.get(mime)? {
            Value::String(text) => Some(text.clone()),
            Value::Array(parts) => Some(parts.iter().filter_map(Value::as_str).collect()),
            _ => None,
        }
    }

    /// MIME types present, in sorted order.
    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for MimeBundle {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// A single event produced by the interpreter during one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// Activity change. `Idle` ends the current request.
    Status(KernelActivity),
    /// Text written to stdout or stderr.
    Stream { name: String, text: String },
    /// Value of the last expression.
    Result(MimeBundle),
    /// Explicitly displayed rich output.
    Display(MimeBundle),
    /// Unhandled exception.
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl ExecutionEvent {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self::Stream {
            name: "stdout".to_string(),
            text: text.into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Status(KernelActivity::Idle))
    }

    /// Decode one raw record.
    ///
    /// Returns `Ok(None)` for record types that carry nothing for the
    /// result (e.g. `execute_input`, `clear_output`).
    pub fn decode(record: Value) -> Result<Option<Self>> {
        let record: RawRecord = serde_json::from_value(record)
            .map_err(|e| Error::Protocol(format!("malformed event record: {}", e)))?;
        let content = record.content;

        let event = match record.msg_type.as_str() {
            "status" => {
                let status: StatusContent = decode_content("status", content)?;
                match status.execution_state.as_str() {
                    "idle" => Self::Status(KernelActivity::Idle),
                    "busy" => Self::Status(KernelActivity::Busy),
                    "starting" | "restarting" => Self::Status(KernelActivity::Starting),
                    other => {
                        tracing::debug!("Ignoring kernel state '{}'", other);
                        return Ok(None);
                    }
                }
            }
            "stream" => {
                let stream: StreamContent = decode_content("stream", content)?;
                Self::Stream {
                    name: stream.name,
                    text: stream.text,
                }
            }
            "execute_result" => {
                let data: DataContent = decode_content("execute_result", content)?;
                Self::Result(data.data.into())
            }
            "display_data" | "update_display_data" => {
                let data: DataContent = decode_content("display_data", content)?;
                Self::Display(data.data.into())
            }
            "error" => {
                let error: ErrorContent = decode_content("error", content)?;
                Self::Error {
                    ename: error.ename,
                    evalue: error.evalue,
                    traceback: error.traceback,
                }
            }
            other => {
                tracing::debug!("Skipping kernel message '{}'", other);
                return Ok(None);
            }
        };

        Ok(Some(event))
    }

    /// Decode one JSON line.
    pub fn from_json_line(line: &str) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| Error::Protocol(format!("invalid event JSON: {}", e)))?;
        Self::decode(value)
    }
}

#[derive(Deserialize)]
struct RawRecord {
    msg_type: String,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct StatusContent {
    execution_state: String,
}

#[derive(Deserialize)]
struct StreamContent {
    #[serde(default = "default_stream_name")]
    name: String,
    #[serde(default)]
    text: String,
}

fn default_stream_name() -> String {
    "stdout".to_string()
}

#[derive(Deserialize)]
struct DataContent {
    #[serde(default)]
    data: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct ErrorContent {
    #[serde(default)]
    ename: String,
    #[serde(default)]
    evalue: String,
    #[serde(default)]
    traceback: Vec<String>,
}

fn decode_content<T: serde::de::DeserializeOwned>(msg_type: &str, content: Value) -> Result<T> {
    serde_json::from_value(content)
        .map_err(|e| Error::Protocol(format!("malformed '{}' content: {}", msg_type, e)))
}
