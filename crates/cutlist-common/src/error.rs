//! Error types shared across the cutlist crates

use thiserror::Error;

/// Result type alias for cutlist operations
pub type Result<T> = std::result::Result<T, CutlistError>;

/// Errors raised at the fallible edges of the workspace.
///
/// The progress tracker itself reports expected misses (unknown session,
/// unknown file, expired entry) through sentinel values rather than errors;
/// this type covers configuration, IO and serialization failures around it.
#[derive(Error, Debug)]
pub enum CutlistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CutlistError::SessionNotFound("session_1".to_string());
        assert_eq!(err.to_string(), "Session not found: session_1");

        let err = CutlistError::Config("ttl must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: ttl must be positive");
    }

    #[test]
    fn test_from_serde_error() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CutlistError = parse.unwrap_err().into();
        assert!(matches!(err, CutlistError::Serialization(_)));
    }
}
