use thiserror::Error;

/// Domain errors for topology and notification operations.
/// `code()` yields the wire-level error tag.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MuxError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("reorder requires one of before, after or index")]
    MissingPosition,

    #[error("window still has workspaces")]
    HasWorkspaces,
}

impl MuxError {
    pub fn code(&self) -> &'static str {
        match self {
            MuxError::NotFound(_) => "not_found",
            MuxError::InvalidHandle(_) => "invalid_handle",
            MuxError::InvalidArgument(_) => "invalid_argument",
            MuxError::ConstraintViolation(_) => "constraint_violation",
            MuxError::NotSupported(_) => "not_supported",
            MuxError::MissingPosition => "missing_position",
            MuxError::HasWorkspaces => "has_workspaces",
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        MuxError::NotFound(what.into())
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
