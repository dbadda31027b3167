use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("change already reviewed")]
    AlreadyReviewed,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid token format")]
    InvalidTokenFormat,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied(reason.into())
    }

    /// Short machine-readable code, used by the realtime channel.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AccessDenied(_) => "access_denied",
            Error::AlreadyReviewed => "already_reviewed",
            Error::InvalidOperation(_) => "invalid_operation",
            Error::InvalidInput(_) => "invalid_input",
            Error::Conflict(_) => "conflict",
            Error::Unavailable(_) => "unavailable",
            Error::InvalidTokenFormat => "unauthorized",
            Error::Io(_) | Error::Config(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
