//! Wire records exchanged with the interpreter process.
//!
//! Format: one JSON document per line over stdin (requests) and stdout
//! (event records).

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reject absurdly long lines (100MB).
const MAX_LINE_BYTES: usize = 100 * 1024 * 1024;

/// Code submission written to the request channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Source code to execute.
    pub code: String,
    /// Suppress the `execute_result` of the last expression.
    #[serde(default)]
    pub silent: bool,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
        }
    }

    pub fn silent(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: true,
        }
    }
}

/// Write one message as a JSON line and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');

    writer
        .write_all(&line)
        .map_err(|e| Error::Transport(format!("Failed to write kernel request: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Transport(format!("Failed to flush kernel request: {}", e)))?;

    Ok(())
}

/// Read one line, without its terminator.
///
/// Returns `Ok(None)` at end of stream.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| Error::Transport(format!("Failed to read kernel event: {}", e)))?;

    if read == 0 {
        return Ok(None);
    }
    if read > MAX_LINE_BYTES {
        return Err(Error::Protocol(format!("kernel event too large: {} bytes", read)));
    }

    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_line_format() {
        let mut buf = Vec::new();
        write_message(&mut buf, &ExecuteRequest::new("print('hi')")).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);

        let decoded: ExecuteRequest = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(decoded.code, "print('hi')");
        assert!(!decoded.silent);
    }

    #[test]
    fn test_multiline_code_stays_on_one_line() {
        let mut buf = Vec::new();
        write_message(&mut buf, &ExecuteRequest::silent("a = 1\nb = 2\n")).unwrap();
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn test_read_lines_until_eof() {
        let mut cursor = Cursor::new(b"first\r\nsecond\n".to_vec());
        assert_eq!(read_line(&mut cursor).unwrap().as_deref(), Some("first"));
        assert_eq!(read_line(&mut cursor).unwrap().as_deref(), Some("second"));
        assert_eq!(read_line(&mut cursor).unwrap(), None);
    }
}
