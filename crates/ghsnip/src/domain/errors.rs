//! Domain-specific errors.

use thiserror::Error;

/// Rejections raised when references are parsed strictly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference does not name a file")]
    EmptyPath,
    #[error("malformed line range in reference '{0}'")]
    MalformedRange(String),
    #[error("line numbers start at 1")]
    ZeroLine,
    #[error("line range L{start}-L{end} ends before it starts")]
    InvertedRange { start: usize, end: usize },
}
