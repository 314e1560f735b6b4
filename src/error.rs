//! Error taxonomy for engine operations.
//!
//! Every engine call returns [`Result`]. The variant tells the caller what
//! kind of failure happened; [`EngineError::code`] gives the stable string the
//! HTTP and MCP surfaces put on the wire.

use thiserror::Error;

/// Errors surfaced by the memory engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown memory id on get / reinforce / delete / traverse.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Malformed parameters: empty content, out-of-range salience or boost, `k == 0`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding provider was unreachable or returned a malformed vector.
    /// Retryable by the caller; the engine never retries on its own.
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    /// The embedding log could not be replayed at startup. Fatal.
    #[error("recovery failed: {0}")]
    RecoveryFailure(String),

    /// Unexpected SQLite failure after startup.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A blocking engine task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::EmbeddingFailure(_) => "embedding_failure",
            Self::RecoveryFailure(_) => "recovery_failure",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::NotFound("x".into()).code(), "not_found");
        assert_eq!(EngineError::invalid("bad").code(), "invalid_argument");
        assert_eq!(
            EngineError::EmbeddingFailure("down".into()).code(),
            "embedding_failure"
        );
        assert_eq!(
            EngineError::RecoveryFailure("corrupt".into()).code(),
            "recovery_failure"
        );
    }

    #[test]
    fn display_includes_id() {
        let err = EngineError::NotFound("abc-123".into());
        assert_eq!(err.to_string(), "memory not found: abc-123");
    }
}
