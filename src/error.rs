//! Error handling for the data hub core.
//!
//! One [`HubError`] variant exists per administrative result code; `OK`
//! is the `Ok` arm of the [`Result`] alias.

use thiserror::Error;

/// Main error type for data hub operations.
#[derive(Error, Debug)]
pub enum HubError {
    /// Malformed path, wrong entry kind for the operation, or a type
    /// mismatch on push/default/override.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Pool allocation failure at the entry, resource, or sample level.
    #[error("Out of memory: {0}")]
    NoMemory(String),

    /// Adding the requested route would close a cycle.
    #[error("Route would create a loop")]
    Duplicate,

    /// A path or value rendition does not fit its size limit.
    #[error("Buffer too small: {0}")]
    Overflow(String),

    /// The entry is not beneath the supplied base.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Push rejected because an administrative update window is active.
    #[error("Administrative update in progress")]
    InProgress,

    /// IO errors (buffer dumps).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other resource-layer failures, surfaced verbatim.
    #[error("{0}")]
    Fault(String),
}

/// Result type alias for data hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HubError::BadParameter("path contains empty segment".to_string());
        assert_eq!(err.to_string(), "Bad parameter: path contains empty segment");
    }

    #[test]
    fn test_duplicate_display() {
        assert_eq!(HubError::Duplicate.to_string(), "Route would create a loop");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: HubError = io.into();
        assert!(err.to_string().contains("pipe closed"));
    }
}
