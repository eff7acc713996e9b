//! Error types for the output engine.
//!
//! Transient sink failures never surface here: they are absorbed by each
//! stage's sticky latch (see [`crate::latch`]) and queryable via
//! `check_error()`. The types in this module cover protocol misuse only,
//! which is fatal to the current render and never retried.

use thiserror::Error;

use crate::context::ContextId;

/// Protocol misuse: programmer errors in how the engine is driven.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A pop was issued against an empty redirection stack.
    #[error("pop on an empty redirection stack in context {context}")]
    EmptyPop {
        /// The offending context.
        context: ContextId,
    },

    /// A stack was created for a context that already owns one.
    #[error("context {context} already owns a redirection stack")]
    StackExists {
        /// The offending context.
        context: ContextId,
    },

    /// A stack operation was issued before any stack was created.
    #[error("no redirection stack exists in context {context}")]
    NoStack {
        /// The offending context.
        context: ContextId,
    },

    /// A facade was requested but the context has no default target to
    /// build the initial frame from.
    #[error("context {context} has no default target to create a stack from")]
    NoDefaultTarget {
        /// The offending context.
        context: ContextId,
    },

    /// The context was already torn down.
    #[error("context {context} was already torn down")]
    TornDown {
        /// The offending context.
        context: ContextId,
    },
}

/// Top-level error type for the output engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Protocol misuse by the embedder.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invariant violation inside the engine.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a protocol error.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let ctx = ContextId::new();
        let err = ProtocolError::EmptyPop { context: ctx };
        assert!(err.to_string().contains("empty redirection stack"));

        let err = ProtocolError::TornDown { context: ctx };
        assert!(err.to_string().contains("torn down"));
    }

    #[test]
    fn test_engine_error_from_protocol() {
        let ctx = ContextId::new();
        let err: EngineError = ProtocolError::NoStack { context: ctx }.into();
        assert!(err.is_protocol());
        assert!(!err.is_internal());
    }

    #[test]
    fn test_engine_error_internal() {
        let err = EngineError::internal("frame table out of sync");
        assert!(err.is_internal());
        assert!(err.to_string().contains("frame table out of sync"));
    }
}
