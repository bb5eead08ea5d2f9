//! Error types for ripple-core
//!
//! Decode failures are plain values so a malformed payload never tears down a
//! consumer loop. Processor failures are caught where a queue invokes its
//! processor and reported through [`ProcessorError`].

use std::time::Duration;
use thiserror::Error;

/// Field of the wire format that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireField {
    /// Whole payload (not valid UTF-8)
    Payload,
    /// Content kind code
    ContentKind,
    /// Update kind code
    UpdateKind,
    /// Content id list
    ContentIds,
    /// JSON-encoded notification body
    Body,
}

impl std::fmt::Display for WireField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload => write!(f, "payload"),
            Self::ContentKind => write!(f, "content kind"),
            Self::UpdateKind => write!(f, "update kind"),
            Self::ContentIds => write!(f, "content ids"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// Underlying parse failure carried by [`DecodeError::Malformed`].
#[derive(Debug, Error)]
pub enum FieldParseError {
    /// Payload is not UTF-8
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    /// Integer field did not parse
    #[error(transparent)]
    Integer(#[from] std::num::ParseIntError),

    /// Integer parsed but names no known value
    #[error("unknown code {0}")]
    UnknownCode(u32),

    /// Content id did not parse
    #[error(transparent)]
    Uuid(#[from] uuid::Error),

    /// JSON body did not parse
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// JSON body names a content change, which only has the pipe layout
    #[error("content changes must use the pipe-delimited layout")]
    ContentChangeAsJson,
}

/// Why a payload could not be turned into a notification.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No bytes at all
    #[error("empty payload")]
    Empty,

    /// Only whitespace
    #[error("blank payload")]
    Blank,

    /// Wrong number of `|`-separated fields
    #[error("expected 4 fields, found {found}")]
    MalformedFieldCount {
        /// Number of fields found
        found: usize,
    },

    /// A field failed to parse
    #[error("malformed {field}: {source}")]
    Malformed {
        /// Offending field
        field: WireField,
        /// Underlying parse failure
        #[source]
        source: FieldParseError,
    },
}

impl DecodeError {
    pub(crate) fn malformed(field: WireField, source: impl Into<FieldParseError>) -> Self {
        Self::Malformed {
            field,
            source: source.into(),
        }
    }
}

/// Failure of one processor call inside an ordered queue.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Processor returned an error
    #[error("processor failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    /// Processor panicked
    #[error("processor panicked: {0}")]
    Panicked(String),

    /// Processor exceeded the configured per-item timeout
    #[error("processor timed out after {0:?}")]
    Timeout(Duration),
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Payload could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Processor failed
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// Notification violates a data model invariant
    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_carries_source() {
        let parse_err = "x".parse::<u32>().unwrap_err();
        let err = DecodeError::malformed(WireField::ContentKind, parse_err);

        let msg = err.to_string();
        assert!(msg.contains("content kind"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_field_count_message() {
        let err = DecodeError::MalformedFieldCount { found: 3 };
        assert_eq!(err.to_string(), "expected 4 fields, found 3");
    }

    #[test]
    fn test_processor_error_wraps_anyhow() {
        let err: ProcessorError = anyhow::anyhow!("handler exploded").into();
        assert!(err.to_string().contains("handler exploded"));

        let err: Error = err.into();
        assert!(matches!(err, Error::Processor(ProcessorError::Failed(_))));
    }
}
