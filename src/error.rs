//! Error taxonomy for the object model.

use crate::css::parser::ParseError;

/// Errors surfaced by mutating or reading a style sheet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CssomError {
    /// The sheet is still being built, or has been detached.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// A rule or item index past the end of its list.
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    /// Rule, selector, or media text failed to parse.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// A structural ordering rule was broken.
    #[error("hierarchy violation: {0}")]
    HierarchyViolation(&'static str),
    /// The caller may not access this sheet's rules.
    #[error("security error: caller does not subsume the sheet principal")]
    Security,
    /// Allocation failed while growing or cloning rule storage.
    #[error("out of memory")]
    OutOfMemory,
    /// A medium or processor that is not present.
    #[error("not found: {0}")]
    NotFound(String),
    /// The rule does not belong to the sheet, or is the wrong kind for the operation.
    #[error("rule does not belong to this sheet or has the wrong kind")]
    WrongSheet,
    /// The sheet handle no longer refers to a live sheet.
    #[error("no such sheet")]
    NoSuchSheet,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CssomError>;

impl From<ParseError> for CssomError {
    fn from(err: ParseError) -> Self {
        CssomError::Syntax(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for CssomError {
    fn from(_: std::collections::TryReserveError) -> Self {
        CssomError::OutOfMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_converts_to_syntax() {
        let err: CssomError = ParseError::UnexpectedEof("expected '}'".into()).into();
        assert!(matches!(err, CssomError::Syntax(ref msg) if msg.contains("expected '}'")));
    }

    #[test]
    fn index_error_message() {
        let err = CssomError::IndexOutOfRange { index: 5, len: 3 };
        assert_eq!(err.to_string(), "index 5 out of range (length 3)");
    }
}
