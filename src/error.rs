/*!
# Errors

Error type shared by document loading and condition evaluation.

Path misses are not errors: navigating to a missing node yields `None` (see
[`crate::path::resolve`]).
*/
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::document::DocumentFormat;

/// Represents errors that can occur while loading or querying a document.
#[derive(Debug)]
pub enum QueryError {
    /// The document path does not exist.
    FileNotFound(PathBuf),
    /// The document exists but could not be read.
    Io {
        /// Path of the document being read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
    /// The document could not be decoded in the given format.
    Parse {
        /// Format the decoder expected
        format: DocumentFormat,
        /// Decoder message
        message: String,
    },
    /// No decoder exists for the requested format name or file extension.
    UnsupportedFormat(String),
    /// A condition uses an operator token with no registered predicate.
    ConditionNotAllowed(String),
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound(path) => {
                write!(f, "File not found: {}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            Self::Parse { format, message } => {
                write!(f, "Invalid {format} document: {message}")
            }
            Self::UnsupportedFormat(name) => {
                write!(f, "Unsupported document format: {name}")
            }
            Self::ConditionNotAllowed(token) => {
                write!(f, "Condition not allowed: {token:?}")
            }
        }
    }
}
