//! Language model error types with retry classification.
//!
//! Distinguishes between transient errors (worth one quick retry) and permanent errors.

use std::time::Duration;

/// Error from a language model invocation.
#[derive(Debug, Clone)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// Error message
    pub message: String,
}

impl LlmError {
    /// Create a timeout error.
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: LlmErrorKind::Timeout,
            message: format!("no response within {}s", after.as_secs()),
        }
    }

    /// Create an unavailable error (model offline, transport down).
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Unavailable,
            message: message.into(),
        }
    }

    /// Create an empty response error.
    pub fn empty_response() -> Self {
        Self {
            kind: LlmErrorKind::EmptyResponse,
            message: "model returned no text".to_string(),
        }
    }

    /// Create an uncategorized error.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Other,
            message: message.into(),
        }
    }

    /// Check if this error is transient and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for LlmError {}

/// Classification of language model errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Call exceeded its deadline - transient
    Timeout,
    /// Model could not be reached - transient
    Unavailable,
    /// Model answered with nothing usable - permanent
    EmptyResponse,
    /// Anything else - permanent
    Other,
}

impl LlmErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmErrorKind::Timeout | LlmErrorKind::Unavailable)
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::Timeout => write!(f, "Timeout"),
            LlmErrorKind::Unavailable => write!(f, "Model unavailable"),
            LlmErrorKind::EmptyResponse => write!(f, "Empty response"),
            LlmErrorKind::Other => write!(f, "Model error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmErrorKind::Timeout.is_transient());
        assert!(LlmErrorKind::Unavailable.is_transient());
        assert!(!LlmErrorKind::EmptyResponse.is_transient());
        assert!(!LlmErrorKind::Other.is_transient());
    }

    #[test]
    fn test_display_includes_kind() {
        let error = LlmError::timeout(Duration::from_secs(5));
        assert_eq!(error.to_string(), "Timeout: no response within 5s");
    }
}
