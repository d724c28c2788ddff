//! Error types for document parsing and queries.
//!
//! Malformed numeric tokens are not errors: they are absorbed by the
//! tokenizer and the previous sticky value is kept. Everything here is a
//! hard failure surfaced to the calling operation.

use thiserror::Error;

/// Errors produced while parsing or querying a G-code document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// An aggregate query was made against a document that cannot answer it
    #[error("{operation} is not supported by streamed documents")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The requested line already left the streaming window
    #[error("instruction {index} is no longer buffered (oldest available is {oldest_available})")]
    EvictedHistory {
        /// The requested instruction index.
        index: usize,
        /// The oldest index still held by the ring buffer.
        oldest_available: usize,
    },

    /// The requested line is past the known end of the document
    #[error("instruction {index} is out of range (document has {len} lines)")]
    IndexOutOfRange {
        /// The requested instruction index.
        index: usize,
        /// Number of lines known at the time of the request.
        len: usize,
    },

    /// A line with an unrecognized leading character in strict mode
    #[error("unrecognized G-code on line {line_number}: '{text}'")]
    StrictModeViolation {
        /// Zero-based line number in the source.
        line_number: usize,
        /// The offending (trimmed) line.
        text: String,
    },

    /// Reading or writing the underlying file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be used
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DocumentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_index() {
        let err = DocumentError::EvictedHistory {
            index: 3,
            oldest_available: 200,
        };
        assert_eq!(
            err.to_string(),
            "instruction 3 is no longer buffered (oldest available is 200)"
        );

        let err = DocumentError::IndexOutOfRange { index: 10, len: 4 };
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DocumentError = io.into();
        assert!(matches!(err, DocumentError::Io(_)));
    }
}
