//! Entity handles as they appear on the wire.
//!
//! A handle is any of: a canonical UUID, a short ref `kind:N`, a decimal
//! index into the listing the client last saw, or the empty string meaning
//! "the current/focused entity of that kind".

use crate::error::MuxError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Window,
    Workspace,
    Pane,
    Surface,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefKind::Window => "window",
            RefKind::Workspace => "workspace",
            RefKind::Pane => "pane",
            RefKind::Surface => "surface",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "window" => Some(RefKind::Window),
            "workspace" => Some(RefKind::Workspace),
            "pane" => Some(RefKind::Pane),
            "surface" => Some(RefKind::Surface),
            _ => None,
        }
    }
}

/// Render a short ref like `window:3`.
pub fn format_ref(kind: RefKind, n: u64) -> String {
    format!("{}:{}", kind.as_str(), n)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    Uuid(Uuid),
    Ref(RefKind, u64),
    Index(usize),
    Current,
}

impl Handle {
    /// Parse in resolution order: UUID, then `kind:N`, then decimal index,
    /// then empty meaning current.  Anything else is `invalid_handle`.
    pub fn parse(s: &str) -> Result<Handle, MuxError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Handle::Current);
        }
        if let Ok(uuid) = Uuid::parse_str(s) {
            return Ok(Handle::Uuid(uuid));
        }
        if let Some((kind, n)) = s.split_once(':') {
            let kind = RefKind::from_str(kind)
                .ok_or_else(|| MuxError::InvalidHandle(format!("unknown ref kind in {:?}", s)))?;
            let n: u64 = n
                .parse()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| MuxError::InvalidHandle(format!("bad ref number in {:?}", s)))?;
            return Ok(Handle::Ref(kind, n));
        }
        if let Ok(idx) = s.parse::<usize>() {
            return Ok(Handle::Index(idx));
        }
        Err(MuxError::InvalidHandle(s.to_string()))
    }

    /// Parse an optional argument; absent means current.
    pub fn parse_opt(s: Option<&str>) -> Result<Handle, MuxError> {
        match s {
            Some(s) => Handle::parse(s),
            None => Ok(Handle::Current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_in_order() {
        let uuid = Uuid::new_v4();
        assert_eq!(Handle::parse(&uuid.to_string()).unwrap(), Handle::Uuid(uuid));
        assert_eq!(
            Handle::parse("window:3").unwrap(),
            Handle::Ref(RefKind::Window, 3)
        );
        assert_eq!(Handle::parse("2").unwrap(), Handle::Index(2));
        assert_eq!(Handle::parse("").unwrap(), Handle::Current);
        assert_eq!(Handle::parse("  ").unwrap(), Handle::Current);
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            Handle::parse("gadget:1"),
            Err(MuxError::InvalidHandle(_))
        ));
        assert!(matches!(
            Handle::parse("window:0"),
            Err(MuxError::InvalidHandle(_))
        ));
        assert!(matches!(
            Handle::parse("window:-1"),
            Err(MuxError::InvalidHandle(_))
        ));
        assert!(matches!(Handle::parse("wat"), Err(MuxError::InvalidHandle(_))));
    }
}
