//! Wire types shared between the cmuxterm server and clients.
//!
//! Two protocols ride the same newline-delimited unix socket:
//! v1 is a whitespace-tokenized line protocol whose responses are plain
//! strings (errors start with `ERROR:`); v2 is one JSON object per line
//! in each direction.  A request line starting with `{` is v2.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum accepted length of a single request or response frame,
/// including the trailing newline.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Error codes used by the v2 protocol and mirrored by v1 `ERROR:` lines.
pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_HANDLE: &str = "invalid_handle";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const CONSTRAINT_VIOLATION: &str = "constraint_violation";
    pub const NOT_SUPPORTED: &str = "not_supported";
    pub const TIMEOUT: &str = "timeout";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const IO_ERROR: &str = "io_error";
    pub const PARSE_ERROR: &str = "parse_error";
    pub const UNKNOWN_METHOD: &str = "unknown_method";
    pub const MISSING_POSITION: &str = "missing_position";
    pub const HAS_WORKSPACES: &str = "has_workspaces";
}

/// A structured protocol error.  `code` is one of [`codes`].
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

impl RpcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, what)
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARGUMENT, what)
    }

    pub fn not_supported(what: impl Into<String>) -> Self {
        Self::new(codes::NOT_SUPPORTED, what)
    }
}

/// A v2 request: `{id, method, params}` on one line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A v2 response: `{ok: true, result}` or `{ok: false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            ok: true,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self {
            ok: false,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| RpcError::new(codes::IO_ERROR, "malformed response")))
        }
    }
}

/// Expand the `\n \r \t \\` escapes used by the v1 `send`/`send_key`
/// commands.  A trailing lone backslash is preserved literally.
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

/// Collapse a notification field to a single line and replace the `|`
/// payload separator with `¦` so the field survives v1 framing.
pub fn sanitize_payload_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.chars() {
        let c = if c == '|' { '¦' } else { c };
        if c == '\n' || c == '\r' || c == '\t' || c == ' ' {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Encode a notification payload for the v1 wire as `title|subtitle|body`.
pub fn encode_notify_payload(title: &str, subtitle: &str, body: &str) -> String {
    format!(
        "{}|{}|{}",
        sanitize_payload_field(title),
        sanitize_payload_field(subtitle),
        sanitize_payload_field(body)
    )
}

/// Split a v1 notification payload into (title, subtitle, body).
/// Missing fields come back empty; extra separators fold into the body.
pub fn split_notify_payload(payload: &str) -> (String, String, String) {
    let mut parts = payload.splitn(3, '|');
    let title = parts.next().unwrap_or("").to_string();
    let subtitle = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    (title, subtitle, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_round_trip() {
        assert_eq!(unescape_text("a\\nb\\tc\\\\d"), "a\nb\tc\\d");
        assert_eq!(escape_text("a\nb\tc\\d"), "a\\nb\\tc\\\\d");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
        assert_eq!(unescape_text("\\x"), "\\x");
    }

    #[test]
    fn payload_sanitization() {
        assert_eq!(sanitize_payload_field("a|b"), "a¦b");
        assert_eq!(sanitize_payload_field("line one\nline  two"), "line one line two");
        assert_eq!(
            encode_notify_payload("Title", "Sub|title", "body\nhere"),
            "Title|Sub¦title|body here"
        );
    }

    #[test]
    fn payload_split() {
        let (t, s, b) = split_notify_payload("Title|Sub|body with | pipe");
        assert_eq!(t, "Title");
        assert_eq!(s, "Sub");
        assert_eq!(b, "body with | pipe");

        let (t, s, b) = split_notify_payload("only title");
        assert_eq!(t, "only title");
        assert_eq!(s, "");
        assert_eq!(b, "");
    }

    #[test]
    fn response_shapes() {
        let ok = Response::result(None, serde_json::json!({"x": 1}));
        let text = serde_json::to_string(&ok).unwrap();
        assert!(text.contains("\"ok\":true"));
        assert!(!text.contains("error"));

        let err = Response::error(None, RpcError::not_found("no such window"));
        assert_eq!(err.into_result().unwrap_err().code, codes::NOT_FOUND);
    }
}
