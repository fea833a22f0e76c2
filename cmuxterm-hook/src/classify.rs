//! Classification of Claude hook notification payloads.
//!
//! The hook JSON is treated as best-effort: field names vary between
//! hook versions, so classification works on a case-insensitive
//! substring match over the joined event/type/reason and
//! message/body/text/prompt/error fields.

use serde_json::Value;

const BODY_LIMIT: usize = 180;
pub const TRANSCRIPT_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationClass {
    Permission,
    Error,
    Waiting,
    Attention,
}

impl NotificationClass {
    /// Only the first three classes warrant an actual notification;
    /// `Attention` events merely refresh the running status.
    pub fn is_actionable(self) -> bool {
        !matches!(self, NotificationClass::Attention)
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            NotificationClass::Permission => "Permission needed",
            NotificationClass::Error => "Error",
            NotificationClass::Waiting => "Waiting",
            NotificationClass::Attention => "Attention",
        }
    }
}

fn join_fields(payload: &Value, names: &[&str]) -> String {
    let mut out = String::new();
    for name in names {
        if let Some(text) = payload.get(*name).and_then(Value::as_str) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
    }
    out
}

/// Classify a hook payload per the signal keywords.
pub fn classify(payload: &Value) -> NotificationClass {
    let kind = join_fields(payload, &["hook_event_name", "event", "type", "reason"]);
    let text = join_fields(payload, &["message", "body", "text", "prompt", "error"]);
    let haystack = format!("{} {}", kind, text).to_lowercase();

    for keyword in &["permission", "approve", "approval"] {
        if haystack.contains(keyword) {
            return NotificationClass::Permission;
        }
    }
    for keyword in &["error", "failed", "exception"] {
        if haystack.contains(keyword) {
            return NotificationClass::Error;
        }
    }
    for keyword in &["idle", "wait", "input", "prompt"] {
        if haystack.contains(keyword) {
            return NotificationClass::Waiting;
        }
    }
    NotificationClass::Attention
}

/// The message text of a hook payload, first non-empty of the usual fields.
pub fn message_text(payload: &Value) -> String {
    for name in &["message", "body", "text", "prompt", "error"] {
        if let Some(text) = payload.get(*name).and_then(Value::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    String::new()
}

fn collapse_to_single_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
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

pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Normalize a notification body: single line, suffixed with the 8-char
/// session prefix when the session is known, truncated to 180 chars.
pub fn normalize_body(text: &str, session_id: Option<&str>) -> String {
    let mut body = collapse_to_single_line(text);
    if let Some(session_id) = session_id {
        let session_id = session_id.trim();
        if !session_id.is_empty() && session_id != "no session" {
            let prefix: String = session_id.chars().take(8).collect();
            if body.is_empty() {
                body = format!("[{}]", prefix);
            } else {
                body = format!("{} [{}]", body, prefix);
            }
        }
    }
    truncate(&body, BODY_LIMIT)
}

/// Pull the last assistant message out of a Claude transcript (JSONL).
/// Best effort: unknown lines are skipped.
pub fn last_assistant_message(transcript: &str) -> Option<String> {
    let mut last = None;
    for line in transcript.lines() {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let is_assistant = value
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t == "assistant")
            .unwrap_or(false)
            || value
                .pointer("/message/role")
                .and_then(Value::as_str)
                .map(|r| r == "assistant")
                .unwrap_or(false);
        if !is_assistant {
            continue;
        }
        if let Some(text) = extract_message_text(&value) {
            if !text.is_empty() {
                last = Some(text);
            }
        }
    }
    last
}

fn extract_message_text(value: &Value) -> Option<String> {
    let content = value
        .pointer("/message/content")
        .or_else(|| value.get("content"))?;
    match content {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(parts) => {
            let mut out = String::new();
            for part in parts {
                let is_text = part
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| t == "text")
                    .unwrap_or(false);
                if is_text {
                    if let Some(text) = part.get("text").and_then(Value::as_str) {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(text.trim());
                    }
                }
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_keywords() {
        let permission = json!({"hook_event_name": "Notification", "message": "Claude needs your permission to use Bash"});
        assert_eq!(classify(&permission), NotificationClass::Permission);

        let error = json!({"type": "Notification", "message": "The tool failed unexpectedly"});
        assert_eq!(classify(&error), NotificationClass::Error);

        let waiting = json!({"hook_event_name": "Notification", "message": "Claude is waiting for your input"});
        assert_eq!(classify(&waiting), NotificationClass::Waiting);

        let attention = json!({"hook_event_name": "Notification", "message": "Something happened"});
        assert_eq!(classify(&attention), NotificationClass::Attention);
        assert!(!classify(&attention).is_actionable());
    }

    #[test]
    fn classification_reads_reason_field() {
        let payload = json!({"reason": "idle_timeout"});
        assert_eq!(classify(&payload), NotificationClass::Waiting);
    }

    #[test]
    fn body_normalization() {
        let body = normalize_body("line one\nline   two", Some("sess-42-abcdef"));
        assert_eq!(body, "line one line two [sess-42-]");

        let body = normalize_body("text", Some("no session"));
        assert_eq!(body, "text");

        let long = "x".repeat(400);
        let body = normalize_body(&long, None);
        assert_eq!(body.chars().count(), 180);
        assert!(body.ends_with('…'));
    }

    #[test]
    fn transcript_tail_extraction() {
        let transcript = concat!(
            "{\"type\":\"user\",\"message\":{\"role\":\"user\",\"content\":\"hi\"}}\n",
            "not json at all\n",
            "{\"type\":\"assistant\",\"message\":{\"role\":\"assistant\",\"content\":[{\"type\":\"text\",\"text\":\"first reply\"}]}}\n",
            "{\"type\":\"assistant\",\"message\":{\"role\":\"assistant\",\"content\":[{\"type\":\"text\",\"text\":\"final reply\"}]}}\n",
        );
        assert_eq!(
            last_assistant_message(transcript),
            Some("final reply".to_string())
        );
        assert_eq!(last_assistant_message("{\"type\":\"user\"}"), None);
    }
}
