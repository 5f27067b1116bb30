//! Error kinds shared by the execution engine.
//!
//! Every failure that can end up in an error reply is an [`EngineError`].
//! Each kind maps to a stable errno-style numeric code so clients can react
//! to it without parsing the description.

/// Errors produced by values, objects, the stack, the processor, the hotkey
/// trie and the action manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Wrong arity, wrong value kind or an out-of-range stack position.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Unknown command, unbound event or unregistered transaction.
    #[error("not found: {0}")]
    NotFound(String),
    /// Duplicate hotkey combo or duplicate name.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// An allocation could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,
    /// The capability is not implemented by the object's type.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Malformed wire message.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Numeric code sent in error replies (errno values).
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => libc::EINVAL,
            Self::NotFound(_) => libc::ENOENT,
            Self::AlreadyExists(_) => libc::EEXIST,
            Self::OutOfMemory => libc::ENOMEM,
            Self::Unsupported(_) => libc::ENOTSUP,
            Self::Protocol(_) => libc::EPROTO,
        }
    }

    /// Short human-readable description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid argument",
            Self::NotFound(_) => "not found",
            Self::AlreadyExists(_) => "already exists",
            Self::OutOfMemory => "out of memory",
            Self::Unsupported(_) => "unsupported",
            Self::Protocol(_) => "protocol error",
        }
    }

    /// The detail carried by the error, without the kind prefix.
    pub fn cause(&self) -> &str {
        match self {
            Self::InvalidArgument(s)
            | Self::NotFound(s)
            | Self::AlreadyExists(s)
            | Self::Unsupported(s)
            | Self::Protocol(s) => s,
            Self::OutOfMemory => "",
        }
    }
}

impl From<std::collections::TryReserveError> for EngineError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}
