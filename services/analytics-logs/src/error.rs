//! Error types for log enumeration and parsing.

use thiserror::Error;

/// Errors that can occur while enumerating log blobs or parsing log records.
///
/// Configuration errors are raised when an enumeration is requested. Every
/// other variant surfaces while pulling from an iterator and ends that
/// enumeration; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid arguments or configuration supplied by the caller
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Log record written with a schema version this crate cannot read
    #[error("Unsupported log record version: {0}")]
    UnsupportedVersion(String),

    /// Malformed log record data
    #[error("Malformed log record: {0}")]
    Format(String),

    /// Failure reading a blob's byte stream
    #[error("Failed to read log stream: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the storage listing or read service
    #[error("Storage service error: {0}")]
    Service(String),

    /// The enumeration was already ended by an earlier failure
    #[error("Enumeration aborted by an earlier failure")]
    Aborted,
}

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }

    /// Returns true when the error was caused by caller input rather than by
    /// the data or the storage service.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::UnsupportedVersion("2.0".to_string()).to_string(),
            "Unsupported log record version: 2.0"
        );
        assert_eq!(
            Error::format("missing delimiter").to_string(),
            "Malformed log record: missing delimiter"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_configuration());
    }
}
